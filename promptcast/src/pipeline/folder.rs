//! Output folder derivation.
//!
//! Every image produced for a prompt lands in one directory whose name is
//! derived from the prompt text. The mapping is deterministic so repeated
//! runs of the same prompt share a folder.
//!
//! # Character Mapping
//!
//! | Input                        | Output        |
//! |------------------------------|---------------|
//! | `,`                          | removed       |
//! | any whitespace               | `_`           |
//! | `/` and `\`                  | `_`           |
//! | anything else                | kept verbatim |
//!
//! A name that ends up empty, or made only of `.` characters, becomes `_`
//! so the folder can never resolve to the results root or its parent.

/// Placeholder used when a description has no usable characters.
const EMPTY_FOLDER: &str = "_";

/// Derives the output folder name for a description.
///
/// # Example
///
/// ```
/// use promptcast::pipeline::folder_name;
///
/// assert_eq!(folder_name("cat, in space"), "cat_in_space");
/// ```
pub fn folder_name(description: &str) -> String {
    let name: String = description
        .chars()
        .filter(|c| *c != ',')
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        return EMPTY_FOLDER.to_string();
    }

    name
}
