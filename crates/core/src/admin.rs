use crate::embeddings::Embedder;
use crate::index::VectorIndexClient;
use crate::models::FetchReport;
use crate::traits::VectorStore;
use crate::BotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    ListIndexes,
    CreateIndex { name: String, dimension: i64 },
    DeleteIndex { name: String },
    FetchVectors { collection: String, ids: Vec<String> },
    DeleteVectors { collection: String, ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminOutcome {
    Indexes(Vec<String>),
    IndexCreated { name: String, dimension: i64 },
    IndexDeleted { name: String },
    Fetched(FetchReport),
    VectorsDeleted { collection: String, count: usize },
}

impl AdminCommand {
    pub async fn execute<S, E>(
        self,
        index: &VectorIndexClient<S, E>,
    ) -> Result<AdminOutcome, BotError>
    where
        S: VectorStore,
        E: Embedder,
    {
        match self {
            AdminCommand::ListIndexes => Ok(AdminOutcome::Indexes(index.list_collections().await?)),
            AdminCommand::CreateIndex { name, dimension } => {
                index.create_collection(&name, dimension).await?;
                Ok(AdminOutcome::IndexCreated { name, dimension })
            }
            AdminCommand::DeleteIndex { name } => {
                index.delete_collection(&name).await?;
                Ok(AdminOutcome::IndexDeleted { name })
            }
            AdminCommand::FetchVectors { collection, ids } => Ok(AdminOutcome::Fetched(
                index.fetch_by_ids(&collection, &ids).await?,
            )),
            AdminCommand::DeleteVectors { collection, ids } => {
                index.delete_by_ids(&collection, &ids).await?;
                Ok(AdminOutcome::VectorsDeleted {
                    collection,
                    count: ids.len(),
                })
            }
        }
    }
}

/// Splits a comma-separated id list. Blank entries are an error rather than
/// ids to send to the store.
pub fn parse_id_list(raw: &str) -> Result<Vec<String>, BotError> {
    if raw.trim().is_empty() {
        return Err(BotError::Validation("enter at least one vector id".to_string()));
    }

    raw.split(',')
        .enumerate()
        .map(|(position, id)| {
            let id = id.trim();
            if id.is_empty() {
                Err(BotError::Validation(format!(
                    "entry {} of the id list is blank",
                    position + 1
                )))
            } else {
                Ok(id.to_string())
            }
        })
        .collect()
}
