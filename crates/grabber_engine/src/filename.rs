use percent_encoding::percent_decode_str;

/// Windows-safe local filename for a saved job file.
///
/// Preference order: the server's `Content-Disposition` name, the job's known
/// filename, then `{job_id}.bin`. Path components are stripped so a hostile
/// name cannot escape the output directory.
pub fn local_filename(disposition: Option<&str>, known: Option<&str>, job_id: &str) -> String {
    disposition
        .and_then(filename_from_disposition)
        .or_else(|| known.map(ToOwned::to_owned))
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}.bin", sanitize_filename(job_id)))
}

/// Extracts the filename from a `Content-Disposition` header value.
///
/// Handles `filename*=UTF-8''...` (percent-encoded) and plain or quoted
/// `filename=...`, preferring the former when both are present.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("filename*") {
            let encoded = value.split_once("''").map_or(value, |(_, rest)| rest);
            if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                return Some(decoded.into_owned());
            }
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(value.trim_matches('"').to_string());
        }
    }
    plain.filter(|name| !name.is_empty())
}

pub fn sanitize_filename(input: &str) -> String {
    // Keep only the last path component.
    let base = input.rsplit(['/', '\\']).next().unwrap_or(input);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= 8 => {
            (stem, Some(ext))
        }
        _ => (base, None),
    };

    let mut name = sanitize_stem(stem);
    if let Some(ext) = ext {
        let ext = sanitize_stem(ext);
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
    }
    name
}

fn sanitize_stem(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let mut final_name: String = compacted.chars().take(120).collect();
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_extended_disposition_name() {
        let header = "attachment; filename=\"fallback.mp4\"; filename*=UTF-8''Caf%C3%A9%20clip.mp4";
        assert_eq!(
            filename_from_disposition(header).as_deref(),
            Some("Café clip.mp4")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"plain name.webm\"").as_deref(),
            Some("plain name.webm")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn malformed_escapes_stay_literal() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''clip%+41.mp4").as_deref(),
            Some("clip%+41.mp4")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''clip%4.mp4").as_deref(),
            Some("clip%4.mp4")
        );
    }

    #[test]
    fn invalid_utf8_extended_name_falls_back_to_plain_name() {
        let header = "attachment; filename*=UTF-8''%FF%FE.mp4; filename=\"plain.mp4\"";
        assert_eq!(filename_from_disposition(header).as_deref(), Some("plain.mp4"));
    }

    #[test]
    fn strips_paths_and_forbidden_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\a.mp4"), "a.mp4");
        assert_eq!(sanitize_filename("What? Now: *live*.mp4"), "What_ Now_ _live.mp4");
        assert_eq!(sanitize_filename("con.mp4"), "con_.mp4");
    }

    #[test]
    fn falls_back_to_job_id() {
        assert_eq!(local_filename(None, None, "7c1e"), "7c1e.bin");
        assert_eq!(local_filename(None, Some("///"), "7c1e"), "7c1e.bin");
        assert_eq!(
            local_filename(Some("attachment"), Some("Clip.m4a"), "7c1e"),
            "Clip.m4a"
        );
    }
}
