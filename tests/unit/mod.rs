//! Most unit tests live inline as `#[cfg(test)]` modules next to the code
//! they exercise (scanner, parser, transform, executor, csr). This target
//! exists so `cargo test --test unit` has somewhere to go for standalone
//! unit-style tests that don't belong to one module.
