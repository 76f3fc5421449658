use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Errors produced while decoding a feed document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body contained no XML elements at all.
    #[error("Feed document is empty")]
    Empty,

    /// XML syntax error (bad nesting, unclosed tags, invalid encoding).
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// Well-formed XML whose root is not `<rss>`.
    #[error("Not an RSS document (root element <{0}>)")]
    NotRss(String),

    /// `<rss>` without a `<channel>`.
    #[error("RSS document has no <channel>")]
    MissingChannel,

    /// Document ended with elements still open.
    #[error("Feed document ended unexpectedly")]
    Truncated,
}

/// One `<item>` as it appeared in the feed, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// Decoded `<channel>` with its items in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RawFeedItem>,
}

impl FetchedFeed {
    /// Resolve HTML entities in every title and description.
    ///
    /// XML escaping is already gone at this point; this handles the second
    /// layer feeds commonly carry (`&amp;lt;b&amp;gt;` decodes to `&lt;b&gt;`
    /// in XML, then to `<b>` here).
    pub fn unescape_html(&mut self) {
        unescape_in_place(&mut self.title);
        unescape_in_place(&mut self.description);
        for item in &mut self.items {
            unescape_in_place(&mut item.title);
            unescape_in_place(&mut item.description);
        }
    }
}

fn unescape_in_place(text: &mut String) {
    if text.contains('&') {
        *text = html_escape::decode_html_entities(text.as_str()).into_owned();
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    ChannelTitle,
    ChannelLink,
    ChannelDescription,
    ItemTitle,
    ItemLink,
    ItemDescription,
    ItemPubDate,
}

/// Decode an RSS 2.0 document.
///
/// Only unprefixed `title`, `link`, `description` and `pubDate` elements are
/// read, so namespaced siblings such as `<atom:link>` or `<dc:date>` never
/// overwrite them. Text fields are trimmed; missing fields stay empty.
pub fn parse_feed(bytes: &[u8]) -> Result<FetchedFeed, ParseError> {
    // SEC-002: quick-xml 0.37 never expands <!ENTITY> declarations from a DOCTYPE.
    let mut reader = Reader::from_reader(bytes);

    let mut feed = FetchedFeed::default();
    let mut saw_root = false;
    let mut saw_channel = false;
    let mut path: Vec<Vec<u8>> = Vec::new();
    // Field being captured and the depth of its element.
    let mut capture: Option<(Field, usize)> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Xml {
                position: reader.error_position() as u64,
                message: e.to_string(),
            })?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                path.push(name);

                if is_channel(&path) {
                    saw_channel = true;
                } else if is_item(&path) {
                    feed.items.push(RawFeedItem::default());
                } else if capture.is_none() {
                    capture = field_for(&path).map(|field| (field, path.len()));
                    // A repeated element replaces the earlier value.
                    if let Some((field, _)) = capture {
                        if let Some(target) = field_mut(&mut feed, field) {
                            target.clear();
                        }
                    }
                }
            }
            Event::Empty(e) => {
                let qname = e.name();
                let name = qname.as_ref();
                if !saw_root {
                    check_root(name)?;
                    saw_root = true;
                    continue;
                }
                if path.len() == 1 && name == b"channel" {
                    saw_channel = true;
                } else if path.len() == 2 && is_channel(&path) && name == b"item" {
                    feed.items.push(RawFeedItem::default());
                }
            }
            Event::Text(t) => {
                if let Some((field, _)) = capture {
                    let raw = reader
                        .decoder()
                        .decode(&t)
                        .map_err(|e| xml_error(&reader, e))?;
                    // Undeclared HTML entities are tolerated instead of failing the feed.
                    let text = match quick_xml::escape::unescape(&raw) {
                        Ok(text) => text.into_owned(),
                        Err(_) => html_escape::decode_html_entities(raw.as_ref()).into_owned(),
                    };
                    append(&mut feed, field, &text);
                }
            }
            Event::CData(c) => {
                if let Some((field, _)) = capture {
                    let text = reader
                        .decoder()
                        .decode(&c)
                        .map_err(|e| xml_error(&reader, e))?;
                    append(&mut feed, field, &text);
                }
            }
            Event::End(_) => {
                if let Some((_, depth)) = capture {
                    if depth == path.len() {
                        capture = None;
                    }
                }
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ParseError::Empty);
    }
    if !path.is_empty() {
        return Err(ParseError::Truncated);
    }
    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    trim_fields(&mut feed);
    Ok(feed)
}

fn xml_error<E: std::fmt::Display>(reader: &Reader<&[u8]>, e: E) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        message: e.to_string(),
    }
}

fn check_root(name: &[u8]) -> Result<(), ParseError> {
    if name == b"rss" {
        Ok(())
    } else {
        Err(ParseError::NotRss(String::from_utf8_lossy(name).into_owned()))
    }
}

fn is_channel(path: &[Vec<u8>]) -> bool {
    path.len() == 2 && path[1] == b"channel"
}

fn is_item(path: &[Vec<u8>]) -> bool {
    path.len() == 3 && path[1] == b"channel" && path[2] == b"item"
}

fn field_for(path: &[Vec<u8>]) -> Option<Field> {
    if path.len() < 3 || path[1] != b"channel" {
        return None;
    }
    match (path.len(), path[2].as_slice(), path.last()?.as_slice()) {
        (3, b"title", _) => Some(Field::ChannelTitle),
        (3, b"link", _) => Some(Field::ChannelLink),
        (3, b"description", _) => Some(Field::ChannelDescription),
        (4, b"item", b"title") => Some(Field::ItemTitle),
        (4, b"item", b"link") => Some(Field::ItemLink),
        (4, b"item", b"description") => Some(Field::ItemDescription),
        (4, b"item", b"pubDate") => Some(Field::ItemPubDate),
        _ => None,
    }
}

fn field_mut(feed: &mut FetchedFeed, field: Field) -> Option<&mut String> {
    let target = match field {
        Field::ChannelTitle => &mut feed.title,
        Field::ChannelLink => &mut feed.link,
        Field::ChannelDescription => &mut feed.description,
        Field::ItemTitle | Field::ItemLink | Field::ItemDescription | Field::ItemPubDate => {
            // Item fields are only captured inside an <item>, which pushed an entry.
            let item = feed.items.last_mut()?;
            match field {
                Field::ItemTitle => &mut item.title,
                Field::ItemLink => &mut item.link,
                Field::ItemDescription => &mut item.description,
                _ => &mut item.pub_date,
            }
        }
    };
    Some(target)
}

/// Text and CDATA chunks of one element are joined.
fn append(feed: &mut FetchedFeed, field: Field, text: &str) {
    if let Some(target) = field_mut(feed, field) {
        target.push_str(text);
    }
}

fn trim_fields(feed: &mut FetchedFeed) {
    trim_in_place(&mut feed.title);
    trim_in_place(&mut feed.link);
    trim_in_place(&mut feed.description);
    for item in &mut feed.items {
        trim_in_place(&mut item.title);
        trim_in_place(&mut item.link);
        trim_in_place(&mut item.description);
        trim_in_place(&mut item.pub_date);
    }
}

fn trim_in_place(text: &mut String) {
    let trimmed = text.trim();
    if trimmed.len() != text.len() {
        *text = trimmed.to_string();
    }
}
