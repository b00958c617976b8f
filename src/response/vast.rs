// src/response/vast.rs

use std::sync::Arc;
use tracing::debug;

use crate::model::bid::Bid;

const DEFAULT_VERSION: f64 = 2.0;
const MAX_VERSION: f64 = 4.0;
const VERSIONS: [&str; 5] = ["0", "1.0", "2.0", "3.0", "4.0"];

/// 取出 `name="value"` 或 `name='value'` 形式的属性值
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let key = format!(" {}=", name);
    let start = tag.find(&key)? + key.len();
    let quote = tag[start..].chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &tag[start + 1..];
    let end = value.find(quote)?;
    Some(&value[..end])
}

/// `<VAST ...>` 开始标签上声明的版本
fn vast_version(adm: &str) -> Option<f64> {
    let start = adm.find("<VAST")?;
    let end = adm[start..].find('>')? + start;
    attribute(&adm[start..end], "version")?.trim().parse().ok()
}

/// 第一个完整的 `<Ad>` 元素（不匹配 `<AdSystem>`、`<AdTitle>` 等）
fn first_ad(adm: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(found) = adm[from..].find("<Ad") {
        let start = from + found;
        let next = adm[start + 3..].chars().next();
        if matches!(next, Some(' ') | Some('>') | Some('\t') | Some('\n') | Some('\r')) {
            let end = adm[start..].find("</Ad>")? + start + "</Ad>".len();
            return Some(&adm[start..end]);
        }
        from = start + 3;
    }
    None
}

/// 给 `<Ad>` 设置 sequence 属性，已有的 sequence 会被替换
fn with_sequence(ad: &str, sequence: usize) -> String {
    let open_end = ad.find('>').unwrap_or(ad.len());
    let (open, rest) = ad.split_at(open_end);
    let mut open = open.trim_end_matches('/').to_string();
    let self_closing = open.len() != ad[..open_end].len();

    if let Some(start) = open.find(" sequence=") {
        let value_start = start + " sequence=".len();
        let quote = open[value_start..].chars().next();
        if let Some(quote @ ('"' | '\'')) = quote {
            if let Some(len) = open[value_start + 1..].find(quote) {
                open.replace_range(start..value_start + 1 + len + 1, "");
            }
        }
    }

    let (head, tail) = open.split_at(3);
    format!(
        "{} sequence=\"{}\"{}{}{}",
        head,
        sequence,
        tail,
        if self_closing { "/" } else { "" },
        rest
    )
}

fn wrapper_ad(url: &str) -> String {
    format!(
        "<Ad><Wrapper><VASTAdTagURI><![CDATA[{}]]></VASTAdTagURI></Wrapper></Ad>",
        url
    )
}

/// **拼接 Pod 素材**
///
/// 按出价顺序取每个素材的第一个 `<Ad>` 并编号；URL 素材包装为 Wrapper。
/// 文档版本取各素材版本的最大值，默认 2.0，最高 4.0。没有可用素材时返回 None。
pub fn stitch_creatives(bids: &[Arc<Bid>]) -> Option<String> {
    let mut version = DEFAULT_VERSION;
    let mut ads = Vec::with_capacity(bids.len());

    for bid in bids {
        let adm = match bid.creative.as_deref().map(str::trim) {
            Some(adm) if !adm.is_empty() => adm,
            _ => {
                debug!(bid_id = %bid.id, "bid has no creative");
                continue;
            }
        };

        let ad = if adm.starts_with("http") {
            wrapper_ad(adm)
        } else {
            let Some(declared) = adm.find("<VAST").and_then(|_| first_ad(adm)) else {
                debug!(bid_id = %bid.id, "creative is not a usable VAST document");
                continue;
            };
            if let Some(v) = vast_version(adm) {
                version = version.max(v);
            }
            declared.to_string()
        };
        ads.push(with_sequence(&ad, ads.len() + 1));
    }

    if ads.is_empty() {
        return None;
    }
    let version = version.min(MAX_VERSION);
    Some(format!(
        "<VAST version=\"{}\">{}</VAST>",
        VERSIONS[version.floor() as usize],
        ads.concat()
    ))
}

/// 调试模式下把响应扩展信息写入 VAST 的 `<Extensions>`
pub fn add_debug_extension(vast: &str, ext: &str) -> String {
    let extension = format!("<Extension type=\"adpod\"><Ext><![CDATA[{}]]></Ext></Extension>", ext);

    if let Some(pos) = vast.find("</Extensions>") {
        let (head, tail) = vast.split_at(pos);
        return format!("{}{}{}", head, extension, tail);
    }
    for end_tag in ["</Wrapper>", "</InLine>"] {
        if let Some(pos) = vast.find(end_tag) {
            let (head, tail) = vast.split_at(pos);
            return format!("{}<Extensions>{}</Extensions>{}", head, extension, tail);
        }
    }
    vast.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bid::test_bid;

    fn creative_bid(id: &str, adm: &str) -> Arc<Bid> {
        let mut bid = test_bid(id, 15, 1.0);
        bid.creative = Some(adm.to_string());
        Arc::new(bid)
    }

    #[test]
    fn stitches_ads_in_order_with_sequence() {
        let bids = vec![
            creative_bid(
                "a",
                r#"<VAST version="3.0"><Ad id="1"><InLine><AdSystem>x</AdSystem></InLine></Ad><Ad id="2"></Ad></VAST>"#,
            ),
            creative_bid("b", "https://ads.example.com/vast?id=2"),
        ];
        let vast = stitch_creatives(&bids).unwrap();
        assert_eq!(
            vast,
            "<VAST version=\"3.0\"><Ad sequence=\"1\" id=\"1\"><InLine><AdSystem>x</AdSystem></InLine></Ad>\
             <Ad sequence=\"2\"><Wrapper><VASTAdTagURI><![CDATA[https://ads.example.com/vast?id=2]]></VASTAdTagURI></Wrapper></Ad></VAST>"
        );
    }

    #[test]
    fn version_defaults_and_is_capped() {
        let bids = vec![creative_bid("a", "<VAST><Ad><InLine></InLine></Ad></VAST>")];
        assert!(stitch_creatives(&bids).unwrap().starts_with("<VAST version=\"2.0\">"));

        let bids = vec![creative_bid("a", "<VAST version='4.2'><Ad><InLine></InLine></Ad></VAST>")];
        assert!(stitch_creatives(&bids).unwrap().starts_with("<VAST version=\"4.0\">"));

        let bids = vec![creative_bid("a", "<VAST version=\"9\"><Ad><InLine></InLine></Ad></VAST>")];
        assert!(stitch_creatives(&bids).unwrap().starts_with("<VAST version=\"4.0\">"));
    }

    #[test]
    fn existing_sequence_is_replaced() {
        assert_eq!(with_sequence("<Ad sequence=\"7\" id=\"x\"></Ad>", 2), "<Ad sequence=\"2\" id=\"x\"></Ad>");
    }

    #[test]
    fn unusable_creatives_are_skipped() {
        let bids = vec![
            creative_bid("a", "not xml"),
            creative_bid("b", "<VAST version=\"3.0\"></VAST>"),
            Arc::new(test_bid("c", 15, 1.0)),
        ];
        assert_eq!(stitch_creatives(&bids), None);
    }

    #[test]
    fn debug_extension_lands_inside_ad() {
        let vast = "<VAST version=\"2.0\"><Ad><InLine></InLine></Ad></VAST>";
        assert_eq!(
            add_debug_extension(vast, "{}"),
            "<VAST version=\"2.0\"><Ad><InLine><Extensions><Extension type=\"adpod\"><Ext><![CDATA[{}]]></Ext></Extension></Extensions></InLine></Ad></VAST>"
        );
        let empty = r#"<VAST version="2.0"/>"#;
        assert_eq!(add_debug_extension(empty, "{}"), empty);
    }
}
