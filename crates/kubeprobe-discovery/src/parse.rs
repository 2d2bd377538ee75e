//! Parsing of `key=value` command output and process arguments

use std::collections::BTreeMap;

/// Parse `key = value` lines, as printed by `sysctl -a`
///
/// Blank lines and lines without `=` are skipped; key and value are trimmed.
/// The first `=` splits, so values may contain further `=` signs.
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Parse `--flag=value` process arguments
///
/// Leading dashes are stripped and keys lower-cased. Arguments without `=`
/// (the program name, positional arguments, bare switches) are skipped.
pub fn parse_args<I, S>(args: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .filter_map(|arg| {
            let arg = arg.as_ref().trim().trim_start_matches('-');
            let (k, v) = arg.split_once('=')?;
            let key = k.trim().to_lowercase();
            if key.is_empty() {
                return None;
            }
            Some((key, v.trim().to_string()))
        })
        .collect()
}
