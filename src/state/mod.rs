/// Round bookkeeping and question types.
pub mod round;
/// Round phase transitions.
pub mod state_machine;
