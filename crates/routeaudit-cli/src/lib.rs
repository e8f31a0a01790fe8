//! Route audit CLI library.
//!
//! Terminal styling and report rendering shared by the `routeaudit-cli`
//! binary.

pub mod output;
pub mod terminal;

#[cfg(test)]
pub(crate) mod test_helpers;
