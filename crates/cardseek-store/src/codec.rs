//! Card-id <-> filesystem-name codec.
//!
//! Card ids may contain characters that are unsafe in filenames. The codec
//! substitutes each unsafe character with a placeholder token; decoding
//! applies the reverse substitutions, longest placeholder first, so no
//! placeholder can be misread as the tail of another. The same table is
//! used by the browser-side downloader, which is why the token spellings
//! are fixed.

use percent_encoding::percent_decode_str;

/// Ordered (placeholder, literal) substitution table.
///
/// Encoding applies the table in this order. `_pct_` is last so that a
/// literal `%` surviving the percent-decode step is still substituted.
const TOKEN_TABLE: &[(&str, char)] = &[
    ("_excl_", '!'),
    ("_qmark_", '?'),
    ("_star_", '*'),
    ("_lt_", '<'),
    ("_gt_", '>'),
    ("_quot_", '"'),
    ("_pipe_", '|'),
    ("_bslash_", '\\'),
    ("_slash_", '/'),
    ("_colon_", ':'),
    ("_pct_", '%'),
];

/// Encode a card id into a filesystem-safe name.
///
/// Percent-encoded input is URL-decoded first (defensive normalization for
/// ids that arrive from web sources); invalid sequences or non-UTF-8
/// decode results leave the input unchanged.
pub fn encode(id: &str) -> String {
    let normalized = percent_decode_str(id)
        .decode_utf8()
        .map_or_else(|_| id.to_string(), |cow| cow.into_owned());

    let mut result = normalized;
    for (placeholder, literal) in TOKEN_TABLE {
        if result.contains(*literal) {
            result = result.replace(*literal, placeholder);
        }
    }
    result
}

/// Decode a filesystem name back into a card id.
///
/// Substitutions are applied longest placeholder first. Fragments that look
/// like placeholders but are not in the table pass through unchanged —
/// silent best-effort, not an error.
pub fn decode(filename: &str) -> String {
    let mut ordered: Vec<&(&str, char)> = TOKEN_TABLE.iter().collect();
    ordered.sort_by_key(|(placeholder, _)| std::cmp::Reverse(placeholder.len()));

    let mut result = filename.to_string();
    for (placeholder, literal) in ordered {
        if result.contains(placeholder) {
            result = result.replace(placeholder, &literal.to_string());
        }
    }
    result
}
