use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ixcore::client::Storage;
use ixcore::config::StorageConfig;
use ixcore::iter::PostingIterator;
use ixcore::model::DocumentEdit;

fn build_storage(nof_docs: u32, terms_per_doc: u32) -> std::sync::Arc<Storage> {
    let config = StorageConfig::parse("path=mem;metadata=doclen u32").unwrap();
    let storage = Storage::create_storage(&config).unwrap();
    for d in 0..nof_docs {
        let mut tx = storage.begin_transaction();
        let mut edit = DocumentEdit::new(format!("doc-{d}"));
        for t in 0..terms_per_doc {
            edit.add_term("word", format!("term-{t}"), t);
        }
        edit.set_metadata("doclen", ixcore::model::NumericValue::U32(terms_per_doc));
        tx.insert_document(edit);
        tx.commit().unwrap();
    }
    storage
}

fn bench_commit_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    for nof_docs in [16u32, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(nof_docs), &nof_docs, |b, &nof_docs| {
            b.iter(|| {
                let storage = build_storage(black_box(nof_docs), 8);
                black_box(storage.nof_documents());
            });
        });
    }
    group.finish();
}

fn bench_term_iterator_scan(c: &mut Criterion) {
    let storage = build_storage(512, 8);
    let type_no = storage.lookup_term_type("word").unwrap();
    let term_no = storage.lookup_term_value("term-0").unwrap();

    c.bench_function("term_iterator_full_scan", |b| {
        b.iter(|| {
            let mut it = storage.term_iterator(type_no, term_no);
            let mut count = 0u32;
            let mut next = Some(0);
            while let Some(docno) = next {
                if it.skip_doc(docno).is_none() {
                    break;
                }
                count += 1;
                next = Some(docno + 1);
            }
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_commit_throughput, bench_term_iterator_scan);
criterion_main!(benches);
