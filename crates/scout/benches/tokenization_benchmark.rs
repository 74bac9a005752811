use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scout::extract::EvidenceDocument;
use scout::token_counter::{TokenCounter, TokenMeter};

fn page(paragraphs: usize) -> String {
    let body = "<p>Vlada Federacije BiH je na danasnjoj sjednici usvojila nacrt zakona.</p>"
        .repeat(paragraphs);
    format!(
        "<html><head><meta property=\"article:published_time\" content=\"2024-05-01\"></head><body>{}</body></html>",
        body
    )
}

fn benchmark_tokenization(c: &mut Criterion) {
    let lengths = [1_000, 10_000, 50_000, 70_000, 100_000];
    let models = ["gpt-4o-mini", "gpt-4"];

    for model_name in models {
        let counter = TokenCounter::new(model_name);
        for &length in &lengths {
            let text = "hello ".repeat(length);
            c.bench_function(&format!("{}_{}_tokens", model_name, length), |b| {
                b.iter(|| counter.count_tokens(black_box(&text)))
            });
        }
    }
}

fn benchmark_extraction(c: &mut Criterion) {
    for paragraphs in [10, 100, 1_000] {
        let html = page(paragraphs);
        c.bench_function(&format!("extract_{}_paragraphs", paragraphs), |b| {
            b.iter(|| EvidenceDocument::from_html("https://example.ba/vijest", black_box(html.as_bytes())).render())
        });
    }
}

criterion_group!(benches, benchmark_tokenization, benchmark_extraction);
criterion_main!(benches);
