/// Script templates
pub mod script;
/// Spending witnesses
pub mod solve;
