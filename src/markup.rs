//! Rich text – reduces HTML-like markup to the text it carries.
//!
//! Markup is run through the html5ever tokenizer: entities are decoded,
//! `<br>` becomes a newline and every other tag is dropped.

use std::cell::RefCell;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{BufferQueue, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts};

#[derive(Default)]
struct TextSink {
    out: RefCell<String>,
}

impl TokenSink for TextSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::CharacterTokens(text) => self.out.borrow_mut().push_str(&text),
            Token::TagToken(tag) if &*tag.name == "br" => self.out.borrow_mut().push('\n'),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

/// Text content of `markup`.
pub fn plain_text(markup: &str) -> String {
    let input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(markup));
    let tokenizer = Tokenizer::new(TextSink::default(), TokenizerOpts::default());
    let _ = tokenizer.feed(&input);
    tokenizer.end();
    tokenizer.sink.out.take()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_dropped_and_br_breaks() {
        assert_eq!(plain_text("<b>Total</b><br/>due"), "Total\ndue");
        assert_eq!(plain_text("<b>aa</b> <i>bb</i>"), "aa bb");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(plain_text("fish &amp; chips &lt;hot&gt;"), "fish & chips <hot>");
    }

    #[test]
    fn angle_brackets_inside_attributes_stay_in_the_tag() {
        assert_eq!(plain_text(r#"<span title="a > b">x</span>"#), "x");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(plain_text("no markup here"), "no markup here");
    }
}
