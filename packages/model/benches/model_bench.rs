use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vellum_model::{Fragment, Node, NodeSpec, Schema, SchemaSpec, Slice};

fn basic_schema() -> Schema {
    let spec = SchemaSpec {
        nodes: vec![
            (
                "doc".to_string(),
                NodeSpec {
                    content: Some("block+".to_string()),
                    ..NodeSpec::default()
                },
            ),
            (
                "paragraph".to_string(),
                NodeSpec {
                    content: Some("inline*".to_string()),
                    group: Some("block".to_string()),
                    ..NodeSpec::default()
                },
            ),
            (
                "blockquote".to_string(),
                NodeSpec {
                    content: Some("block+".to_string()),
                    group: Some("block".to_string()),
                    ..NodeSpec::default()
                },
            ),
            (
                "text".to_string(),
                NodeSpec {
                    group: Some("inline".to_string()),
                    ..NodeSpec::default()
                },
            ),
        ],
        marks: Vec::new(),
        top_node: None,
    };
    Schema::compile(spec).expect("bench schema compiles")
}

fn wide_doc(schema: &Schema, paragraphs: usize) -> Node {
    let children: Vec<Node> = (0..paragraphs)
        .map(|i| {
            let text = schema.text(format!("paragraph number {}", i)).unwrap();
            schema
                .node("paragraph", None, Some(Fragment::from(text)), vec![])
                .unwrap()
        })
        .collect();
    schema
        .node("doc", None, Some(Fragment::from_vec(children)), vec![])
        .unwrap()
}

fn compile_schema(c: &mut Criterion) {
    c.bench_function("compile_schema", |b| b.iter(|| basic_schema()));
}

fn resolve_positions(c: &mut Criterion) {
    let schema = basic_schema();
    let doc = wide_doc(&schema, 100);
    let size = doc.content().size();

    c.bench_function("resolve_middle_position", |b| {
        b.iter(|| doc.resolve(black_box(size / 2)).unwrap())
    });
}

fn replace_text(c: &mut Criterion) {
    let schema = basic_schema();
    let doc = wide_doc(&schema, 100);
    let insert = Slice::new(Fragment::from(schema.text("inserted").unwrap()), 0, 0);

    c.bench_function("replace_insert_text", |b| {
        b.iter(|| doc.replace(black_box(50), black_box(55), &insert).unwrap())
    });
}

criterion_group!(benches, compile_schema, resolve_positions, replace_text);
criterion_main!(benches);
