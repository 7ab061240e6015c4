//! Persons, family units and households

pub mod person;
pub mod store;
pub mod unit;

pub use person::Person;
pub use store::{ClonedUnit, Population, Role};
pub use unit::{Household, Unit};
