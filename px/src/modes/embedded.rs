//! Embedded mode prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use super::Mode;

pub const PLAN_MANAGER: &str = include_str!("../../prompts/plan-manager.pmt");

pub const ARCHITECT: &str = include_str!("../../prompts/architect.pmt");

pub const CODE: &str = include_str!("../../prompts/code.pmt");

pub const DEBUG: &str = include_str!("../../prompts/debug.pmt");

/// Built-in template for `mode`
pub fn template_for(mode: Mode) -> &'static str {
    match mode {
        Mode::PlanManager => PLAN_MANAGER,
        Mode::Architect => ARCHITECT,
        Mode::Code => CODE,
        Mode::Debug => DEBUG,
    }
}
