use criterion::{self, criterion_group, criterion_main, Criterion, Throughput};
use xml_value::reader::XmlReader;
use xml_value::{from_str, se, xmlrpc, DecodeOptions, EncodeOptions, Value};

/// A feed with `n` entries, each with attributes, text and a repeated child.
fn feed(n: usize) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><feed>"#);
    for i in 0..n {
        xml.push_str(&format!(
            r#"<entry id="{i}" lang="en"><title>Entry &amp; number {i}</title><tag>a</tag><tag>b</tag><body>text<br/>more text</body></entry>"#
        ));
    }
    xml.push_str("</feed>");
    xml
}

fn xmlrpc_response(n: usize) -> String {
    let items: Vec<Value> = (0..n)
        .map(|i| {
            vec![
                ("id", Value::from(i as i64)),
                ("name", Value::from(format!("item {}", i))),
                ("ratio", Value::from(i as f64 / 3.0)),
                ("active", Value::from(i % 2 == 0)),
            ]
            .into_iter()
            .collect::<xml_value::Mapping>()
            .into()
        })
        .collect();
    xmlrpc::make_response(&Value::Sequence(items), &EncodeOptions::default()).unwrap()
}

fn generic(c: &mut Criterion) {
    let xml = feed(1_000);
    let mut group = c.benchmark_group("generic");
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("collapse", |b| {
        let options = DecodeOptions::default();
        b.iter(|| criterion::black_box(from_str(&xml, &options).unwrap()))
    });
    group.bench_function("preserve_order", |b| {
        let options = DecodeOptions::default().preserve_order(true);
        b.iter(|| criterion::black_box(from_str(&xml, &options).unwrap()))
    });

    let value = from_str(&xml, &DecodeOptions::default()).unwrap();
    group.bench_function("encode", |b| {
        let options = EncodeOptions::default();
        b.iter(|| criterion::black_box(se::to_string(&value, &options).unwrap()))
    });
    group.finish();
}

fn pull(c: &mut Criterion) {
    let xml = feed(1_000);
    let mut group = c.benchmark_group("pull");
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("advance", |b| {
        b.iter(|| {
            let mut reader = XmlReader::from_str(&xml);
            let mut count = 0;
            while reader.advance().unwrap().is_some() {
                count += 1;
            }
            criterion::black_box(count)
        })
    });
    group.bench_function("elements", |b| {
        b.iter(|| {
            let mut reader = XmlReader::from_str(&xml);
            for entry in reader.elements("entry", DecodeOptions::default()) {
                criterion::black_box(entry.unwrap());
            }
        })
    });
    group.finish();
}

fn rpc(c: &mut Criterion) {
    let xml = xmlrpc_response(500);
    let mut group = c.benchmark_group("xmlrpc");
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("parse_response", |b| {
        b.iter(|| criterion::black_box(xmlrpc::parse_response(&xml).unwrap()))
    });
    let value = match xmlrpc::parse_response(&xml).unwrap() {
        xmlrpc::Response::Success(value) => value,
        xmlrpc::Response::Fault(fault) => panic!("{}", fault),
    };
    group.bench_function("make_response", |b| {
        b.iter(|| {
            criterion::black_box(xmlrpc::make_response(&value, &EncodeOptions::default()).unwrap())
        })
    });
    group.finish();
}

criterion_group!(benches, generic, pull, rpc);
criterion_main!(benches);
