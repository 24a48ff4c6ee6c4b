/// Host identification for the terminal.
pub mod sys_info;
/// Clock and string helpers.
pub mod utils;
