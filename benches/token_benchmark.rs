use std::sync::Arc;

use chrono::Duration;
use criterion::{Criterion, criterion_group, criterion_main};
use ouath::key::{DEFAULT_KEY_SIZE, DEFAULT_KID, KeyManager};
use ouath::store::{AuthorizationCodeStore, GrantContext};
use ouath::token::TokenCodec;

fn context() -> GrantContext {
    GrantContext {
        client_id: "app1".into(),
        user_id: "alice".into(),
        redirect_uri: "http://cb/".into(),
        scope: "profile".into(),
    }
}

fn token_benchmark(c: &mut Criterion) {
    let keys = Arc::new(
        KeyManager::generate(DEFAULT_KID, DEFAULT_KEY_SIZE)
            .expect("cannot generate RSA key"),
    );
    let codec = TokenCodec::new("http://localhost:8080", keys);
    let grant = context();
    let token = codec.sign(&grant).expect("cannot sign");

    c.bench_function("sign RS256", |b| b.iter(|| codec.sign(&grant)));
    c.bench_function("verify RS256", |b| b.iter(|| codec.verify(&token)));
}

fn store_benchmark(c: &mut Criterion) {
    let store = AuthorizationCodeStore::new();

    c.bench_function("issue and redeem code", |b| {
        b.iter(|| {
            let code = store
                .issue(context(), Duration::minutes(10))
                .expect("cannot issue");
            store.redeem(&code)
        })
    });
}

criterion_group!(benches, token_benchmark, store_benchmark);
criterion_main!(benches);
