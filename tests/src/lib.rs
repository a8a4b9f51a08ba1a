//! Black-box scenarios driving the full todo service router.

#[cfg(test)]
mod system_tests;
