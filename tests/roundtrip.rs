//! Documents decoded with the generic decoder and written back with `se`
//! decode to the same tree.

use xml_value::{from_str, se, DecodeOptions, EncodeOptions, Value};

use pretty_assertions::assert_eq;

fn check(xml: &str, decode: &DecodeOptions, encode: &EncodeOptions) -> String {
    let value = from_str(xml, decode).unwrap();
    let written = se::to_string(&value, encode).unwrap();
    let again = from_str(&written, decode).unwrap();
    assert_eq!(again, value, "after writing\n{}", written);
    written
}

const DOCUMENTS: &[&str] = &[
    "<a/>",
    "<a>text</a>",
    r#"<a x="1" y="&quot;two&quot;"/>"#,
    "<a><b>1</b><b>2</b><c/></a>",
    "<a>hello<b>x</b>world</a>",
    "<a><![CDATA[<not> & markup]]></a>",
    "<a>&lt;&amp;&gt;</a>",
    r#"<catalog>
  <book id="bk101">
    <author>Gambardella, Matthew</author>
    <title>XML Developer's Guide</title>
    <price>44.95</price>
  </book>
  <book id="bk102">
    <author>Ralls, Kim</author>
    <title>Midnight Rain</title>
    <price>5.95</price>
  </book>
</catalog>"#,
];

#[test]
fn compact() {
    for xml in DOCUMENTS {
        check(xml, &DecodeOptions::default(), &EncodeOptions::default());
    }
}

#[test]
fn ordered() {
    let decode = DecodeOptions::default().preserve_order(true);
    for xml in DOCUMENTS {
        check(xml, &decode, &EncodeOptions::default());
    }
    let written = check(
        "<a><x>1</x><y/><x>2</x><x>3</x></a>",
        &decode,
        &EncodeOptions::default(),
    );
    assert_eq!(
        written,
        r#"<?xml version="1.0" encoding="UTF-8"?><a><x>1</x><y/><x>2</x><x>3</x></a>"#
    );
}

#[test]
fn comments() {
    let decode = DecodeOptions::default().add_comments(true);
    let written = check(
        "<!--head--><a><!--one-->x</a>",
        &decode,
        &EncodeOptions::default(),
    );
    assert_eq!(
        written,
        r#"<?xml version="1.0" encoding="UTF-8"?><!--head--><a><!--one-->x</a>"#
    );
}

#[test]
fn formatted() {
    let encode = EncodeOptions::default().format_with_whitespace(true);
    let written = check(DOCUMENTS[7], &DecodeOptions::default(), &encode);
    assert!(written.contains("\n  <book id=\"bk101\">\n    <author>"));
}

#[test]
fn numeric_refs() {
    let encode = EncodeOptions::default().use_numeric_refs(true);
    let written = check("<a>caf\u{e9} \u{263A}</a>", &DecodeOptions::default(), &encode);
    assert!(written.is_ascii());
    assert_eq!(
        from_str(&written, &DecodeOptions::default()).unwrap()["a"],
        Value::from("café ☺")
    );
}
