//! Streaming reader for the `tweets.json` / `tweets.js` file of an archive export.
//!
//! The top-level array is framed by hand so that only one entry is held in
//! memory at a time; each element is handed to `serde_json`, which skips every
//! field outside [`TWEET_FIELDS`](crate::record::TWEET_FIELDS) without building it.

use crate::error::ArchiveError;
use crate::record::{Record, TweetFields};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ArchiveEntry {
    tweet: RawTweet,
}

#[derive(Debug, Deserialize)]
struct RawTweet {
    #[serde(deserialize_with = "string_or_integer")]
    id: String,
    full_text: String,
    created_at: String,
    #[serde(deserialize_with = "string_or_integer")]
    retweet_count: String,
    #[serde(deserialize_with = "string_or_integer")]
    favorite_count: String,
}

impl From<RawTweet> for TweetFields {
    fn from(raw: RawTweet) -> Self {
        Self {
            id: raw.id,
            full_text: raw.full_text,
            created_at: raw.created_at,
            retweet_count: raw.retweet_count,
            favorite_count: raw.favorite_count,
        }
    }
}

/// Archives write ids and counts as strings, but hand-edited or re-exported
/// files sometimes use plain integers.
fn string_or_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct StringOrInteger;

    impl Visitor<'_> for StringOrInteger {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrInteger)
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    FirstEntry,
    NextEntry,
    Done,
}

/// Lazy, forward-only iterator over the records of an archive.
///
/// The first error ends the iteration. The underlying reader is released when
/// the `ArchiveReader` is dropped.
pub struct ArchiveReader<R> {
    reader: R,
    state: State,
    index: usize,
}

impl ArchiveReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: State::Start,
            index: 0,
        }
    }

    /// Skip whitespace and peek at the next byte without consuming it.
    fn peek_token(&mut self) -> Result<Option<u8>, ArchiveError> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let next = buf.get(skip).copied();
            self.reader.consume(skip);
            if next.is_some() {
                return Ok(next);
            }
        }
    }

    fn open_array(&mut self) -> Result<(), ArchiveError> {
        if self.reader.fill_buf()?.starts_with(UTF8_BOM) {
            self.reader.consume(UTF8_BOM.len());
        }

        match self.peek_token()? {
            Some(b'[') => {}
            // `window.YTD.tweets.part0 = [` as found in tweets.js
            Some(b) if b.is_ascii_alphabetic() => {
                let mut prefix = Vec::new();
                self.reader.read_until(b'=', &mut prefix)?;
                if prefix.last() != Some(&b'=') {
                    return Err(ArchiveError::Syntax(
                        "expected a JSON array or a `name = [` assignment".to_string(),
                    ));
                }
                if self.peek_token()? != Some(b'[') {
                    return Err(ArchiveError::Syntax(
                        "expected `[` after assignment prefix".to_string(),
                    ));
                }
            }
            Some(b) => {
                return Err(ArchiveError::Syntax(format!(
                    "expected `[`, found {:?}",
                    b as char
                )))
            }
            None => return Err(ArchiveError::Syntax("archive is empty".to_string())),
        }
        self.reader.consume(1);
        Ok(())
    }

    fn close_array(&mut self) -> Result<(), ArchiveError> {
        self.reader.consume(1);
        if self.peek_token()? == Some(b';') {
            self.reader.consume(1);
        }
        match self.peek_token()? {
            None => Ok(()),
            Some(b) => Err(ArchiveError::Syntax(format!(
                "trailing {:?} after archive array",
                b as char
            ))),
        }
    }

    fn next_entry(&mut self) -> Result<Record, ArchiveError> {
        let index = self.index;
        self.index += 1;

        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let entry = ArchiveEntry::deserialize(&mut de)
            .map_err(|source| ArchiveError::Entry { index, source })?;

        Record::parse(entry.tweet.into()).map_err(|e| ArchiveError::Field {
            index,
            field: e.field,
            reason: e.reason,
        })
    }

    fn advance(&mut self) -> Result<Option<Record>, ArchiveError> {
        if self.state == State::Start {
            self.open_array()?;
            self.state = State::FirstEntry;
        }

        match (self.state, self.peek_token()?) {
            (State::Done, _) => Ok(None),
            (State::FirstEntry | State::NextEntry, Some(b']')) => {
                self.state = State::Done;
                self.close_array()?;
                Ok(None)
            }
            (State::FirstEntry, Some(_)) => {
                self.state = State::NextEntry;
                self.next_entry().map(Some)
            }
            (State::NextEntry, Some(b',')) => {
                self.reader.consume(1);
                self.next_entry().map(Some)
            }
            (_, Some(b)) => Err(ArchiveError::Syntax(format!(
                "expected `,` or `]` after entry #{}, found {:?}",
                self.index.saturating_sub(1),
                b as char
            ))),
            (_, None) => Err(ArchiveError::Syntax(
                "unexpected end of archive, missing `]`".to_string(),
            )),
        }
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = Result<Record, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Done {
            return None;
        }
        match self.advance() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for ArchiveReader<R> {}
