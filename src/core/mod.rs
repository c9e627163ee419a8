pub mod debounce;
pub mod readiness;
