/// Target of the `rel="next"` entry in a `Link` header, if any.
///
/// The header is a comma-separated list of `<url>; rel="name"` segments.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|segment| {
        let mut parts = segment.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| {
                    rel.trim_matches('"')
                        .split_whitespace()
                        .any(|name| name.eq_ignore_ascii_case("next"))
                })
                .unwrap_or(false)
        });
        is_next.then(|| url.to_string())
    })
}
