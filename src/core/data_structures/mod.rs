/*!
 * Data Structures
 * Specialized containers for the tracking hot path
 */

mod inline_string;

pub use inline_string::InlineString;
