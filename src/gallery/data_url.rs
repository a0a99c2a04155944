//! # Data URL 解析
//!
//! 规则很宽松：第一个逗号之前是元数据，之后是载荷；没有逗号则整串都是载荷。
//! 元数据不要求以 `data:` 开头，只尽力提取声明的 MIME，用于日志诊断。
//! 这一阶段不报错，格式问题留给解码阶段。

/// 解析后的 Data URL。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl<'a> {
    /// 元数据里声明的 MIME（如 `image/png`），可能缺失。
    pub declared_mime_type: Option<String>,
    /// 未解码的 base64 文本。
    pub payload: &'a str,
}

impl<'a> DataUrl<'a> {
    /// 拆分元数据与载荷。
    pub fn parse(input: &'a str) -> Self {
        match input.split_once(',') {
            Some((metadata, payload)) => Self {
                declared_mime_type: Self::mime_from_metadata(metadata),
                payload,
            },
            None => Self {
                declared_mime_type: None,
                payload: input,
            },
        }
    }

    /// `data:image/png;base64` → `image/png`
    fn mime_from_metadata(metadata: &str) -> Option<String> {
        let metadata = metadata.trim();
        let body = metadata.strip_prefix("data:").unwrap_or(metadata);
        let mime = body.split(';').next().unwrap_or("").trim();

        if mime.contains('/') && !mime.contains(char::is_whitespace) {
            Some(mime.to_ascii_lowercase())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_standard_data_url() {
        let url = DataUrl::parse("data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(url.declared_mime_type.as_deref(), Some("image/png"));
        assert_eq!(url.payload, "iVBORw0KGgo=");
    }

    #[test]
    fn whole_string_is_payload_without_comma() {
        let url = DataUrl::parse("iVBORw0KGgo=");
        assert_eq!(url.declared_mime_type, None);
        assert_eq!(url.payload, "iVBORw0KGgo=");
    }

    #[test]
    fn accepts_metadata_without_scheme() {
        let url = DataUrl::parse("IMAGE/JPEG;base64,/9j/");
        assert_eq!(url.declared_mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(url.payload, "/9j/");
    }

    #[test]
    fn only_first_comma_separates() {
        let url = DataUrl::parse("data:image/png;base64,abc,def");
        assert_eq!(url.payload, "abc,def");
    }

    #[test]
    fn garbage_metadata_has_no_mime() {
        let url = DataUrl::parse("hello world,QUJD");
        assert_eq!(url.declared_mime_type, None);
        assert_eq!(url.payload, "QUJD");
    }

    proptest! {
        #[test]
        fn payload_is_everything_after_first_comma(prefix in "[^,]{0,40}", rest in ".{0,80}") {
            let input = format!("{prefix},{rest}");
            let url = DataUrl::parse(&input);
            prop_assert_eq!(url.payload, rest.as_str());
        }

        #[test]
        fn comma_free_input_is_payload(input in "[^,]{0,120}") {
            let url = DataUrl::parse(&input);
            prop_assert_eq!(url.payload, input.as_str());
            prop_assert!(url.declared_mime_type.is_none());
        }
    }
}
