use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    db::DbPool,
    entities::movement_log::{self, MovementOperation},
    errors::ServiceError,
    events::EventSender,
};

const MAX_PER_PAGE: u64 = 100;
const DEFAULT_PER_PAGE: u64 = 20;

/// Pages through the movement log, newest first. Filters combine with AND;
/// page numbering starts at 1 and the page size is capped at 100.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListMovementsCommand {
    pub warehouse_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub operation: Option<MovementOperation>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MovementPage {
    pub movements: Vec<movement_log::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

#[async_trait::async_trait]
impl Command for ListMovementsCommand {
    type Result = MovementPage;

    #[instrument(name = "movement_log_list", skip(self, db_pool, _event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "page numbering starts at 1".into(),
            ));
        }
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let mut query = movement_log::Entity::find();
        if let Some(warehouse_id) = self.warehouse_id {
            query = query.filter(movement_log::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(product_id) = self.product_id {
            query = query.filter(movement_log::Column::ProductId.eq(product_id));
        }
        if let Some(operation) = self.operation {
            query = query.filter(movement_log::Column::Operation.eq(operation));
        }

        let paginator = query
            .order_by_desc(movement_log::Column::OccurredAt)
            .order_by_desc(movement_log::Column::Id)
            .paginate(db_pool.as_ref(), per_page);
        let totals = paginator.num_items_and_pages().await?;
        let movements = paginator.fetch_page(page - 1).await?;

        Ok(MovementPage {
            movements,
            page,
            per_page,
            total_pages: totals.number_of_pages,
            total_items: totals.number_of_items,
        })
    }
}
