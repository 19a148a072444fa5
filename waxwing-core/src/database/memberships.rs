use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::model::catalog::GroupMembership;
use crate::types::ArtistId;

#[derive(Clone, Debug)]
pub struct MembershipRepository {
    pool: PgPool,
}

const COLUMNS: &str = "id, member_id, group_id, begin_date, end_date, \
     begin_date_raw, end_date_raw, ended, created_at, updated_at";

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All stints for one (member, group) pair, oldest first.
    pub async fn list_stints(
        &self,
        member_id: ArtistId,
        group_id: ArtistId,
    ) -> Result<Vec<GroupMembership>> {
        let stints = sqlx::query_as::<_, GroupMembership>(&format!(
            "SELECT {COLUMNS} FROM artist_group_memberships \
             WHERE member_id = $1 AND group_id = $2 \
             ORDER BY begin_date NULLS FIRST, created_at"
        ))
        .bind(member_id)
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(stints)
    }

    pub async fn insert_stint(
        &self,
        member_id: ArtistId,
        group_id: ArtistId,
        begin_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        begin_date_raw: Option<&str>,
        end_date_raw: Option<&str>,
        ended: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artist_group_memberships
                (member_id, group_id, begin_date, end_date,
                 begin_date_raw, end_date_raw, ended)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (member_id, group_id,
                         COALESCE(begin_date_raw, ''), COALESCE(end_date_raw, ''))
                DO NOTHING
            "#,
        )
        .bind(member_id)
        .bind(group_id)
        .bind(begin_date)
        .bind(end_date)
        .bind(begin_date_raw)
        .bind(end_date_raw)
        .bind(ended)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rewrite a stint's dates and ended flag after precision refinement.
    pub async fn update_stint(
        &self,
        id: Uuid,
        begin_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        begin_date_raw: Option<&str>,
        end_date_raw: Option<&str>,
        ended: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE artist_group_memberships
            SET begin_date = $2,
                end_date = $3,
                begin_date_raw = $4,
                end_date_raw = $5,
                ended = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(begin_date)
        .bind(end_date)
        .bind(begin_date_raw)
        .bind(end_date_raw)
        .bind(ended)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_ended(&self, id: Uuid, ended: bool) -> Result<()> {
        sqlx::query(
            "UPDATE artist_group_memberships SET ended = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(ended)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
