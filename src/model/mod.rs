pub mod action;
pub mod combatant;
pub mod damage;
pub mod effect;

pub use action::*;
pub use combatant::*;
pub use damage::*;
pub use effect::*;
