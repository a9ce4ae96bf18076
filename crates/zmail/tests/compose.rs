//! Composition tests: compose, then decode the payload back.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use zmail::{
    Address, Attachment, Content, EmbeddedFile, Mail, build_mail, compose_mail, format_addresses,
};
use zmail_mime::{ContentType, EncodeOptions, Message};

#[test]
fn format_plain_address() {
    let list = [Address::with_name("John", "john@foo.com").unwrap()];
    assert_eq!(format_addresses(&list, "us-ascii"), "John <john@foo.com>");
}

#[test]
fn format_encoded_name() {
    let list = [Address::with_name("léo", "leo@foo.com").unwrap()];
    assert_eq!(
        format_addresses(&list, "iso-8859-1"),
        "=?iso-8859-1?Q?l=E9o?= <leo@foo.com>"
    );
}

#[test]
fn format_falls_back_to_utf8() {
    let list = [Address::with_name("Māori", "maori@b.com").unwrap()];
    let header = format_addresses(&list, "iso-8859-1");
    assert!(header.starts_with("=?utf-8?"));
    assert!(header.ends_with(" <maori@b.com>"));
}

#[test]
fn euro_sign_is_not_latin1() {
    let list = [Address::with_name("€uro", "e@x.com").unwrap()];
    let header = format_addresses(&list, "iso-8859-1");
    assert!(header.starts_with("=?utf-8?"), "{header}");

    let part = build_mail(Some(&Content::new("5 €", "iso-8859-1")), None, &[], &[], false);
    assert_eq!(part.charset(), Some("utf-8"));
    assert_eq!(part.payload(), Some("5 €".as_bytes()));

    let part = build_mail(Some(&Content::new("5 é", "iso-8859-1")), None, &[], &[], false);
    assert_eq!(part.charset(), Some("iso-8859-1"));
    assert_eq!(part.payload(), Some(&b"5 \xe9"[..]));
}

#[test]
fn format_mixed_list() {
    let list = [
        Address::new("a@bar.com").unwrap(),
        Address::with_name("John", "john@foo.com").unwrap(),
    ];
    assert_eq!(
        format_addresses(&list, "us-ascii"),
        "a@bar.com, John <john@foo.com>"
    );
}

#[test]
fn non_ascii_attachment_name_survives() {
    let mail = Mail::new(Address::new("me@foo.com").unwrap(), "files")
        .to(Address::new("him@bar.com").unwrap());
    let attachments = [Attachment::new(vec![0x25, 0x50, 0x44, 0x46, 0xff, 0x00])
        .with_content_type(ContentType::new("application", "pdf"))
        .with_filename("äöü.pdf")];
    let envelope = compose_mail(&mail, Some(&Content::utf8("body")), None, &attachments, &[])
        .unwrap();

    assert!(envelope.payload.is_ascii());
    let message = Message::parse(&envelope.payload).unwrap();
    let found = message.attachments();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].filename(), Some("äöü.pdf"));
    assert_eq!(found[0].payload(), Some(&[0x25, 0x50, 0x44, 0x46, 0xff, 0x00][..]));

    let parts = message.mail_parts();
    let pdf = parts.iter().find(|p| p.mime_type == "application/pdf").unwrap();
    assert_eq!(pdf.sanitized_filename.as_deref(), Some("äöü.pdf"));
}

#[test]
fn non_ascii_sender_and_subject() {
    let mail = Mail::new(Address::with_name("Jürgen", "j@foo.com").unwrap(), "Grüße")
        .to(Address::with_name("Zoë, Smith", "z@bar.com").unwrap())
        .with_charset("iso-8859-1");
    let envelope = compose_mail(&mail, Some(&Content::utf8("hi")), None, &[], &[]).unwrap();

    assert!(envelope.payload.is_ascii());
    let message = Message::parse(&envelope.payload).unwrap();
    assert_eq!(message.subject().as_deref(), Some("Grüße"));
    let from = message.from().unwrap();
    assert_eq!(from.name(), Some("Jürgen"));
    assert_eq!(from.email(), "j@foo.com");
    let to = message.to();
    assert_eq!(to.len(), 1);
    assert_eq!(to[0].name(), Some("Zoë, Smith"));
}

#[test]
fn related_body_with_embedded_image() {
    let mail = Mail::new(Address::new("me@foo.com").unwrap(), "logo")
        .to(Address::new("him@bar.com").unwrap());
    let embeddeds = [EmbeddedFile::new(b"GIF89a".to_vec(), "logo@foo.com")
        .with_content_type(ContentType::new("image", "gif"))];
    let envelope = compose_mail(
        &mail,
        Some(&Content::utf8("see logo")),
        Some(&Content::utf8("<img src=\"cid:logo@foo.com\">")),
        &[],
        &embeddeds,
    )
    .unwrap();

    let message = Message::parse(&envelope.payload).unwrap();
    assert!(message.root.content_type.is("multipart", "related"));
    assert_eq!(message.body_text().as_deref(), Some("see logo"));
    assert!(message.html_part().is_some());
    let image = message
        .root
        .walk()
        .into_iter()
        .find(|p| p.content_type.is("image", "gif"))
        .unwrap();
    assert_eq!(image.content_id(), Some("logo@foo.com"));
    assert_eq!(image.payload(), Some(&b"GIF89a"[..]));
}

#[test]
fn seeded_compose_is_reproducible() {
    let mail = Mail::new(Address::new("me@foo.com").unwrap(), "s")
        .to(Address::new("him@bar.com").unwrap())
        .with_date(1_700_000_000)
        .with_encode_options(EncodeOptions::new().with_boundary_seed(3));
    let attachments = [Attachment::new(b"data".to_vec())];
    let a = compose_mail(&mail, Some(&Content::utf8("x")), None, &attachments, &[]).unwrap();
    let b = compose_mail(&mail, Some(&Content::utf8("x")), None, &attachments, &[]).unwrap();
    assert_eq!(a.payload, b.payload);
}

proptest! {
    #[test]
    fn body_text_survives(text in "[a-zA-Z0-9 äöüé.,!?\n]{0,200}") {
        let part = build_mail(Some(&Content::utf8(text.clone())), None, &[], &[], false);
        let bytes = Message::new(part).to_bytes().unwrap();
        let message = Message::parse(&bytes).unwrap();
        let expected = text.replace('\n', "\r\n");
        prop_assert_eq!(message.body_text().unwrap_or_default(), expected);
    }
}
