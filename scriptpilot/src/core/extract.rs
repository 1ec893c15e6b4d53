//! Fenced-block script extraction.
//!
//! Grammar, one line at a time:
//!
//! ```text
//! open  := indent{0,3} "`"{n>=3} tag? ws* EOL
//! tag   := [A-Za-z0-9_+.#-]+
//! body  := any lines up to the first matching close
//! close := indent{0,3} "`"{m>=n} ws* EOL
//! ```
//!
//! The first block with both fences wins. An open fence that never closes is
//! treated as absence so a truncated reply is never executed.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::ExtractedScript;

static OPEN_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(`{3,})([A-Za-z0-9_+.#-]*)[ \t]*$").expect("open fence regex")
});
static CLOSE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,})[ \t]*$").expect("close fence regex"));

/// Return the first well-formed fenced script in `text`, if any.
pub fn extract_script(text: &str) -> Option<ExtractedScript> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(open) = OPEN_FENCE.captures(line.trim_end_matches('\r')) else {
            continue;
        };
        let fence_len = open[1].len();
        let language_tag = open[2].to_ascii_lowercase();

        let mut body: Vec<&str> = Vec::new();
        for inner in lines.by_ref() {
            let inner = inner.trim_end_matches('\r');
            if is_close_fence(inner, fence_len) {
                return Some(ExtractedScript {
                    language_tag,
                    body: body.join("\n"),
                });
            }
            body.push(inner);
        }
        // Unterminated block consumed the rest of the input.
        return None;
    }
    None
}

fn is_close_fence(line: &str, open_len: usize) -> bool {
    CLOSE_FENCE
        .captures(line)
        .is_some_and(|caps| caps[1].len() >= open_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_block_and_ignores_prose() {
        let text = "Sure, here you go:\n```python\nprint(\"ok\")\n```\nLet me know.";
        let script = extract_script(text).expect("script");
        assert_eq!(script.language_tag, "python");
        assert_eq!(script.body, "print(\"ok\")");
    }

    #[test]
    fn plain_answer_has_no_script() {
        assert_eq!(extract_script("The capital of France is Paris."), None);
        assert_eq!(extract_script(""), None);
    }

    #[test]
    fn untagged_block_has_empty_tag() {
        let script = extract_script("```\necho hi\n```").expect("script");
        assert_eq!(script.language_tag, "");
        assert_eq!(script.body, "echo hi");
    }

    #[test]
    fn first_of_many_blocks_wins() {
        let text = "```sh\necho one\n```\nand\n```python\nprint(2)\n```";
        let script = extract_script(text).expect("script");
        assert_eq!(script.language_tag, "sh");
        assert_eq!(script.body, "echo one");
    }

    #[test]
    fn unterminated_block_is_absent() {
        assert_eq!(extract_script("```python\nimport os\nos.remove("), None);
    }

    #[test]
    fn inline_backticks_are_not_fences() {
        assert_eq!(extract_script("run `ls` then ```python print(1)```"), None);
    }

    #[test]
    fn longer_fence_may_contain_shorter_fences() {
        let text = "````markdown\n```\ninner\n```\n````";
        let script = extract_script(text).expect("script");
        assert_eq!(script.language_tag, "markdown");
        assert_eq!(script.body, "```\ninner\n```");
    }

    #[test]
    fn close_fence_may_be_longer_and_indented() {
        let script = extract_script("  ```bash\nls -la\n   `````  ").expect("script");
        assert_eq!(script.language_tag, "bash");
        assert_eq!(script.body, "ls -la");
    }

    #[test]
    fn tag_is_lowercased_and_crlf_tolerated() {
        let script = extract_script("```Python\r\nprint(1)\r\n\r\nprint(2)\r\n```\r\n")
            .expect("script");
        assert_eq!(script.language_tag, "python");
        assert_eq!(script.body, "print(1)\n\nprint(2)");
    }

    #[test]
    fn deeply_indented_fence_is_not_a_fence() {
        assert_eq!(extract_script("    ```python\n    print(1)\n    ```"), None);
    }

    #[test]
    fn fence_with_trailing_words_is_not_an_opener() {
        assert_eq!(extract_script("```python run this\nprint(1)\n```"), None);
    }

    #[test]
    fn empty_block_yields_empty_body() {
        let script = extract_script("```sh\n```").expect("script");
        assert_eq!(script.body, "");
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "intro\n```js\nconsole.log(1)\n```\noutro";
        assert_eq!(extract_script(text), extract_script(text));
    }
}
