/// State management module
///
/// This module handles all application state, including:
/// - Session identity storage (session.rs)
/// - Shared capture data structures and the submission payload (data.rs)
/// - The capture screen lifecycle: streams, scanners, results (capture.rs)

pub mod session;
pub mod data;
pub mod capture;
