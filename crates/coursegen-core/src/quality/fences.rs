//! Fenced code region scanner.
//!
//! A region opens at a line whose first non-blank characters are three
//! backticks and closes at the next such line. An opening fence with no
//! closing partner yields a region that runs to the end of the text.

use std::ops::Range;

/// One fenced code region, as byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// From the opening fence to the end of the closing fence line.
    pub span: Range<usize>,
    /// Between the opening fence line and the closing fence.
    pub body: Range<usize>,
    /// Info string after the opening backticks (e.g. `ts`), trimmed.
    pub info: String,
    pub terminated: bool,
}

impl FencedBlock {
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body.clone()]
    }

    pub fn full<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.clone()]
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Every fenced region in `text`, in order.
pub fn scan(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(usize, usize, String)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if !is_fence(line) {
            continue;
        }
        match open.take() {
            None => {
                let info = line.trim().trim_start_matches('`').trim().to_string();
                open = Some((line_start, offset, info));
            }
            Some((start, body_start, info)) => {
                let content_end = line_start + line.trim_end_matches(['\n', '\r']).len();
                blocks.push(FencedBlock {
                    span: start..content_end,
                    body: body_start..line_start,
                    info,
                    terminated: true,
                });
            }
        }
    }

    if let Some((start, body_start, info)) = open {
        blocks.push(FencedBlock {
            span: start..text.len(),
            body: body_start.min(text.len())..text.len(),
            info,
            terminated: false,
        });
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_paired_fences_with_info_strings() {
        let text = "intro\n```ts\nconst a = 1;\n```\nmid\n  ```\nplain\n```\nend";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].info, "ts");
        assert_eq!(blocks[0].body(text), "const a = 1;\n");
        assert_eq!(blocks[0].full(text), "```ts\nconst a = 1;\n```");
        assert_eq!(blocks[1].info, "");
        assert_eq!(blocks[1].body(text), "plain\n");
        assert!(blocks.iter().all(|b| b.terminated));
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let text = "```js\nfunction f() {\n  return 1;";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].terminated);
        assert_eq!(blocks[0].body(text), "function f() {\n  return 1;");
        assert_eq!(blocks[0].span, 0..text.len());
    }

    #[test]
    fn opening_fence_at_end_has_empty_body() {
        let text = "text\n```";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body(text), "");
    }

    #[test]
    fn no_fences_no_blocks() {
        assert!(scan("just prose\nwith lines\n").is_empty());
    }
}
