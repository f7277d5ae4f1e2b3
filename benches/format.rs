//! Performance benchmarks for a3s-agent-chat
//!
//! Run with: cargo bench

use a3s_agent_chat::provider::memory::MemoryProvider;
use a3s_agent_chat::{
    clean_text, extract_embedded_query, extract_table, AgentClient, Orchestrator, RetryConfig,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn table_text(rows: usize) -> String {
    let mut text = String::from("Here are the results:\n\n\n\n| region | sales | margin |\n| --- |  --- | --- |\n");
    for i in 0..rows {
        text.push_str(&format!("| r{} | {} | {}.5 |\n", i, i * 1000, i));
    }
    text.push_str("\n\n\nLet me know if you need more.");
    text
}

fn bench_clean_text(c: &mut Criterion) {
    let text = table_text(50);
    c.bench_function("clean_text (50 rows)", |b| {
        b.iter(|| clean_text(&text));
    });
}

fn bench_extract_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_table");
    for rows in [10, 100, 1000] {
        let text = clean_text(&table_text(rows));
        group.bench_function(format!("{} rows", rows), |b| {
            b.iter(|| extract_table(&text));
        });
    }
    group.finish();
}

fn bench_extract_query(c: &mut Criterion) {
    let structural = vec![serde_json::json!({
        "trace": {"orchestrationTrace": {"invocationInput": [{
            "actionGroupInvocationInput": {"requestBody": {"content": {
                "application/json": [{"name": "sql_query", "value": "SELECT *\\nFROM orders"}]
            }}}
        }]}}
    })];
    c.bench_function("extract_embedded_query (structural)", |b| {
        b.iter(|| extract_embedded_query(&structural));
    });

    // Deep tree where only a free-text rationale mentions the query
    let mut deep = serde_json::json!({"rationale": {"text": "I will run SELECT id FROM users WHERE active = 1 now"}});
    for i in 0..20 {
        deep = serde_json::json!({ format!("level{}", i): deep, "noise": [1, 2, 3] });
    }
    let deep = vec![deep];
    c.bench_function("extract_embedded_query (deep regex)", |b| {
        b.iter(|| extract_embedded_query(&deep));
    });
}

fn bench_submit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let text = table_text(20);

    c.bench_function("Orchestrator submit (memory)", |b| {
        b.to_async(&rt).iter(|| async {
            let provider = MemoryProvider::default().with_fallback(text.as_str());
            let orchestrator = Orchestrator::new(
                AgentClient::new(provider).with_retry_config(RetryConfig::disabled()),
            );
            let mut session = orchestrator.new_session();
            orchestrator
                .submit(&mut session, "Sales by region?")
                .await
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_clean_text,
    bench_extract_table,
    bench_extract_query,
    bench_submit,
);
criterion_main!(benches);
