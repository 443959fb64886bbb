// Canonicalization, signing & verification benchmarks for the Satchel core.
//
// Covers canonical encoding of a transaction, P-256 key generation, payload
// signing and verification, and full transaction verification at various
// input counts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use satchel_core::codec::CanonicalCodec;
use satchel_core::crypto::{derive_address, PrivateKey, SignatureEngine};
use satchel_core::transaction::{
    sign_transaction, verify_transaction, AssetType, Transaction, TransactionBuilder, Utxo,
};

fn signed_transaction(key: &PrivateKey, inputs: usize) -> Transaction {
    let address = derive_address(&key.public_key()).unwrap();
    let utxos: Vec<Utxo> = (0..inputs)
        .map(|i| Utxo::new(format!("{:064x}", i), i as u32, &address, 1_000, AssetType::Coin))
        .collect();
    let mut tx = TransactionBuilder::new()
        .inputs(&utxos)
        .output("bb".repeat(20), 500, AssetType::Coin)
        .fee(10)
        .timestamp(1_700_000_000_000)
        .metadata("memo", "coffee")
        .change_address(&address)
        .build()
        .unwrap();
    sign_transaction(&mut tx, key, &SignatureEngine::default()).unwrap();
    tx
}

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("p256/keypair_generate", |b| {
        b.iter(PrivateKey::generate);
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let tx = signed_transaction(&key, 8);
    let codec = CanonicalCodec::default();

    c.bench_function("codec/canonical_string", |b| {
        b.iter(|| codec.canonical_string(&tx, &["Signature"]).unwrap());
    });
}

fn bench_sign_payload(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let tx = signed_transaction(&key, 2);
    let engine = SignatureEngine::default();

    c.bench_function("p256/sign_payload", |b| {
        b.iter(|| engine.sign(&tx, &["Signature"], &key).unwrap());
    });
}

fn bench_verify_payload(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let tx = signed_transaction(&key, 2);
    let engine = SignatureEngine::default();
    let public_key = key.public_key();

    c.bench_function("p256/verify_payload", |b| {
        b.iter(|| engine.verify(&tx, &["Signature"], &tx.signature, &public_key));
    });
}

fn bench_verify_transaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction/verify");
    let engine = SignatureEngine::default();

    for inputs in [1, 10, 50] {
        let tx = signed_transaction(&PrivateKey::generate(), inputs);
        group.throughput(Throughput::Elements(inputs as u64));
        group.bench_with_input(BenchmarkId::from_parameter(inputs), &tx, |b, tx| {
            b.iter(|| verify_transaction(tx, &engine).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_canonicalize,
    bench_sign_payload,
    bench_verify_payload,
    bench_verify_transaction,
);
criterion_main!(benches);
