use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use test_filter::lexer::Lexer;
use test_filter::parser::Parser;
use test_filter::{
    script, CriterionElement, ElementCollection, ExtendWithConnector, ExtendWithCriterion,
    TestFilter,
};

const SCRIPTS: [(&str, &str); 3] = [
    ("simple", "test~ test1"),
    ("medium", "cat cat1 and prop~ prop2 value2 or not id id3,id4,id5"),
    (
        "complex",
        "name a and name b or name c and not class D or method~ E.* and namespace F or id g,h",
    ),
];

// 构建一条交替使用 AND/OR 的链, 返回叶子元素
fn build_chain(links: usize) -> CriterionElement {
    let mut leaf = TestFilter::builder()
        .category("cat0", false)
        .expect("构建应该成功");
    for i in 1..links {
        let group = if (i / 3) % 2 == 0 {
            leaf.and().expect("构建应该成功")
        } else {
            leaf.or().expect("构建应该成功")
        };
        leaf = if i % 4 == 0 {
            group
                .not()
                .and_then(|n| n.test(&format!("test{}", i), true))
                .expect("构建应该成功")
        } else {
            group.category(&format!("cat{}", i), false).expect("构建应该成功")
        };
    }
    leaf
}

// 基准测试：编译性能
fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_performance");

    for links in [1, 10, 100, 1000] {
        let leaf = build_chain(links);
        group.bench_with_input(BenchmarkId::new("build", links), &leaf, |b, leaf| {
            b.iter(|| {
                let document = TestFilter::build(black_box(leaf)).expect("编译应该成功");
                black_box(document)
            })
        });
    }

    group.finish();
}

// 基准测试：解析性能
fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_performance");

    for links in [1, 10, 100, 1000] {
        let text = build_chain(links).build().expect("编译应该成功").into_text();
        group.bench_with_input(BenchmarkId::new("parse", links), &text, |b, text| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(text)).collect();
                let mut parser = Parser::new(&tokens);
                match parser.parse() {
                    Ok(selection) => black_box(selection),
                    Err(_) => panic!("解析失败"),
                }
            })
        });
    }

    group.finish();
}

// 基准测试：完整的端到端处理
fn benchmark_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end_performance");

    for (name, source) in SCRIPTS {
        group.bench_with_input(BenchmarkId::new("script", name), &source, |b, &source| {
            b.iter(|| {
                let document = script::compile(black_box(source)).expect("编译应该成功");
                let selection = document.parse().expect("解析应该成功");
                black_box(selection)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_compile,
    benchmark_parse,
    benchmark_end_to_end
);
criterion_main!(benches);
