//! Shared test harness: an isolated sqlite database per test with the full
//! schema applied, plus seed helpers for master data and stock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use stockflow_api::db::DbPool;
use stockflow_api::entities::partner::{self, PartnerKind};
use stockflow_api::entities::{product, warehouse};
use stockflow_api::events::{Event, EventSender};
use stockflow_api::ledger;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    /// Kept open so event publication never fails; tests may also drain it.
    pub events: mpsc::Receiver<Event>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("stockflow-test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(5).sqlx_logging(false);
        let db = Database::connect(opt).await.expect("sqlite connects");
        migrations::Migrator::up(&db, None)
            .await
            .expect("migrations apply");

        let (tx, rx) = mpsc::channel(1024);
        Self {
            db: Arc::new(db),
            event_sender: Arc::new(EventSender::new(tx)),
            events: rx,
            _tmp: tmp,
        }
    }

    pub async fn seed_warehouse(&self) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        warehouse::ActiveModel {
            id: Set(id),
            code: Set(format!("WH-{}", &id.to_string()[..8])),
            name: Set("Test warehouse".into()),
            enabled: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("warehouse inserts");
        id
    }

    pub async fn seed_disabled_warehouse(&self) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        warehouse::ActiveModel {
            id: Set(id),
            code: Set(format!("WH-{}", &id.to_string()[..8])),
            name: Set("Mothballed warehouse".into()),
            enabled: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("warehouse inserts");
        id
    }

    pub async fn seed_product(&self, code: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        product::ActiveModel {
            id: Set(id),
            code: Set(code.to_string()),
            name: Set(format!("Product {}", code)),
            unit: Set("pcs".into()),
            enabled: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("product inserts");
        id
    }

    pub async fn seed_partner(&self, kind: PartnerKind) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        partner::ActiveModel {
            id: Set(id),
            code: Set(format!("PT-{}", &id.to_string()[..8])),
            name: Set("Test partner".into()),
            kind: Set(kind),
            enabled: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("partner inserts");
        id
    }

    pub async fn seed_supplier(&self) -> Uuid {
        self.seed_partner(PartnerKind::Supplier).await
    }

    pub async fn seed_customer(&self) -> Uuid {
        self.seed_partner(PartnerKind::Customer).await
    }

    /// Puts unreserved stock on hand, bypassing the document flows.
    pub async fn seed_stock(&self, warehouse_id: Uuid, product_id: Uuid, qty: Decimal) {
        ledger::increase(self.db.as_ref(), warehouse_id, product_id, qty)
            .await
            .expect("stock seeds");
    }

    /// (on_hand, reserved) for one pair; (0, 0) when no row exists.
    pub async fn balance(&self, warehouse_id: Uuid, product_id: Uuid) -> (Decimal, Decimal) {
        ledger::find_balance(self.db.as_ref(), warehouse_id, product_id)
            .await
            .expect("balance readable")
            .map(|b| (b.on_hand_qty, b.reserved_qty))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO))
    }

    pub async fn qc_qty(&self, warehouse_id: Uuid, product_id: Uuid) -> Decimal {
        ledger::find_qc_balance(self.db.as_ref(), warehouse_id, product_id)
            .await
            .expect("qc balance readable")
            .map(|b| b.qc_qty)
            .unwrap_or(Decimal::ZERO)
    }
}
