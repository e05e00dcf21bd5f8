use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use f1api_auth::{AuthorizationEngine, Permission, PermissionStore, PrincipalId, StoreError};

/// Fixed grant set; one principal, no locking.
struct Grants(BTreeSet<Permission>);

#[async_trait]
impl PermissionStore for Grants {
    async fn permissions_for(&self, _principal_id: PrincipalId) -> Result<Vec<Permission>, StoreError> {
        Ok(self.0.iter().cloned().collect())
    }

    async fn register(&self, _permission: Permission) -> Result<(), StoreError> {
        Ok(())
    }

    async fn grant(&self, _principal_id: PrincipalId, _permission: &Permission) -> Result<(), StoreError> {
        Ok(())
    }

    async fn revoke(&self, _principal_id: PrincipalId, _permission: &Permission) -> Result<(), StoreError> {
        Ok(())
    }
}

fn bench_decision(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

    for size in [8usize, 64, 512] {
        let grants: BTreeSet<Permission> = (0..size)
            .map(|i| Permission::new(format!("/resource{i}/:id"), "GET"))
            .collect();
        let engine = AuthorizationEngine::new(Arc::new(Grants(grants)));
        let principal = PrincipalId::new();
        let last = format!("/resource{}/:id", size - 1);

        c.bench_function(&format!("is_allowed/{size}_grants/hit_last"), |b| {
            b.iter(|| rt.block_on(engine.is_allowed(principal, black_box(&last), "GET")))
        });
        c.bench_function(&format!("is_allowed/{size}_grants/miss"), |b| {
            b.iter(|| rt.block_on(engine.is_allowed(principal, black_box("/nope"), "GET")))
        });
    }
}

criterion_group!(benches, bench_decision);
criterion_main!(benches);
