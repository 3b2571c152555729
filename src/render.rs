//! Output renderers for the merged item sequence.
//!
//! These only format; ordering is decided by the pipeline.

use anyhow::{Context, Result};
use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::config::ChannelConfig;
use crate::feed::FeedItem;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {name} element"))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("Failed to write {name} text"))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {name} end"))?;
    Ok(())
}

/// Renders an RSS 2.0 document for the given channel and items.
///
/// Items are written in the order given. The guid falls back to the link
/// upstream, so it is marked as not a permalink.
pub fn rss(channel: &ChannelConfig, items: &[FeedItem]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut root = BytesStart::new("rss");
    root.push_attribute(("version", "2.0"));
    root.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
    root.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    writer
        .write_event(Event::Start(root))
        .context("Failed to write rss element")?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .context("Failed to write channel element")?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    if let Some(site_url) = &channel.site_url {
        write_text_element(&mut writer, "link", site_url)?;
    }
    if let Some(feed_url) = &channel.feed_url {
        let mut link = BytesStart::new("atom:link");
        link.push_attribute(("href", feed_url.as_str()));
        link.push_attribute(("rel", "self"));
        link.push_attribute(("type", "application/rss+xml"));
        writer
            .write_event(Event::Empty(link))
            .context("Failed to write atom:link element")?;
    }
    if let Some(language) = &channel.language {
        write_text_element(&mut writer, "language", language)?;
    }
    if let Some(copyright) = &channel.copyright {
        write_text_element(&mut writer, "copyright", copyright)?;
    }
    if let Some(ttl) = channel.ttl {
        write_text_element(&mut writer, "ttl", &ttl.to_string())?;
    }
    write_text_element(&mut writer, "lastBuildDate", &Utc::now().to_rfc2822())?;
    write_text_element(
        &mut writer,
        "generator",
        concat!("feedagg ", env!("CARGO_PKG_VERSION")),
    )?;

    for item in items {
        write_item(&mut writer, item)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .context("Failed to write channel end")?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .context("Failed to write rss end")?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("Generated RSS is not valid UTF-8")
}

fn write_item(writer: &mut XmlWriter, item: &FeedItem) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .context("Failed to write item element")?;

    write_text_element(writer, "title", &item.title)?;
    if let Some(description) = &item.description {
        write_text_element(writer, "description", description)?;
    }
    if let Some(link) = &item.link {
        write_text_element(writer, "link", link)?;
    }
    if !item.guid.is_empty() {
        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        writer
            .write_event(Event::Start(guid))
            .context("Failed to write guid element")?;
        writer
            .write_event(Event::Text(BytesText::new(&item.guid)))
            .context("Failed to write guid text")?;
        writer
            .write_event(Event::End(BytesEnd::new("guid")))
            .context("Failed to write guid end")?;
    }
    for category in &item.categories {
        write_text_element(writer, "category", category)?;
    }
    if !item.author.is_empty() {
        write_text_element(writer, "dc:creator", &item.author)?;
    }
    if let Some(published) = item.published {
        write_text_element(writer, "pubDate", &published.to_rfc2822())?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .context("Failed to write item end")?;
    Ok(())
}

/// Renders one JSON object per item, newline-terminated.
pub fn json_lines(items: &[FeedItem]) -> Result<String> {
    let mut out = String::new();
    for item in items {
        let line = serde_json::to_string(item)
            .with_context(|| format!("Failed to serialize item '{}'", item.guid))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
