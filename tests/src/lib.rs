//! # Bridge Node Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-crate scenarios
//!     ├── fixtures.rs   # Node homes, gateways, fatal recorders
//!     ├── node_flows.rs # Admission, ordering, key types through a running node
//!     └── recovery.rs   # Crash, lost state and tampered block log handling
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bridge-tests
//!
//! # By category
//! cargo test -p bridge-tests integration::recovery
//!
//! # Benchmarks
//! cargo bench -p bridge-tests
//! ```

pub mod integration;
