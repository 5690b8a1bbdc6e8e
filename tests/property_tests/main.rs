//! Property-based tests for the proxy's pure transformations
//!
//! Body normalization must stay within its bounds and round-trip whatever it
//! keeps; path joining must never double or drop the seam slash.

mod body_normalizer;
mod path_joining;
