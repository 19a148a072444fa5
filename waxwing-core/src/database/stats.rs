//! Read-side aggregates for dashboards: top groups, top solo artists,
//! recent plays with their credits, artist detail with memberships.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{AlbumId, ArtistId, ScrobbleId, TrackId, UserId};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ArtistPlays {
    pub id: ArtistId,
    pub name: String,
    pub mbid: Option<String>,
    pub artist_type: Option<String>,
    pub image_url: Option<String>,
    pub play_count: i64,
    pub total_duration_ms: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct RecentPlayRow {
    pub id: ScrobbleId,
    pub played_at: DateTime<Utc>,
    pub played_duration_ms: i64,
    pub skipped: bool,
    pub track_id: TrackId,
    pub track_title: String,
    pub track_duration_ms: Option<i64>,
    pub album_id: Option<AlbumId>,
    pub album_title: Option<String>,
    pub album_image_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CreditRow {
    pub track_id: TrackId,
    pub artist_id: ArtistId,
    pub name: String,
    pub is_primary: bool,
    pub position: i32,
    pub join_phrase: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecentPlay {
    #[serde(flatten)]
    pub row: RecentPlayRow,
    pub artists: Vec<CreditRow>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct MembershipEntry {
    pub membership_id: Uuid,
    pub artist_id: ArtistId,
    pub name: String,
    pub mbid: Option<String>,
    pub artist_type: Option<String>,
    pub image_url: Option<String>,
    pub begin_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub begin_date_raw: Option<String>,
    pub end_date_raw: Option<String>,
    pub ended: bool,
}

#[derive(Clone, Debug)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn top_groups(&self, user_id: UserId, limit: i64) -> Result<Vec<ArtistPlays>> {
        self.top_artists_of_types(user_id, &["group", "orchestra", "choir"], limit)
            .await
    }

    pub async fn top_solo_artists(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<ArtistPlays>> {
        self.top_artists_of_types(user_id, &["person"], limit).await
    }

    async fn top_artists_of_types(
        &self,
        user_id: UserId,
        types: &[&str],
        limit: i64,
    ) -> Result<Vec<ArtistPlays>> {
        let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        let rows = sqlx::query_as::<_, ArtistPlays>(
            r#"
            SELECT a.id, a.name, a.mbid, a.artist_type, a.image_url,
                   COUNT(*) AS play_count,
                   COALESCE(SUM(s.played_duration_ms), 0)::bigint AS total_duration_ms
            FROM scrobbles s
            JOIN track_artists ta ON ta.track_id = s.track_id
            JOIN artists a ON a.id = ta.artist_id
            WHERE s.user_id = $1 AND a.artist_type = ANY($2)
            GROUP BY a.id, a.name, a.mbid, a.artist_type, a.image_url
            ORDER BY play_count DESC, a.name
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(&types)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recently_played(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<RecentPlay>> {
        let rows = sqlx::query_as::<_, RecentPlayRow>(
            r#"
            SELECT s.id, s.played_at, s.played_duration_ms, s.skipped,
                   t.id AS track_id, t.title AS track_title,
                   t.duration_ms AS track_duration_ms,
                   al.id AS album_id, al.title AS album_title,
                   al.image_url AS album_image_url
            FROM scrobbles s
            JOIN tracks t ON t.id = s.track_id
            LEFT JOIN albums al ON al.id = s.album_id
            WHERE s.user_id = $1
            ORDER BY s.played_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let track_ids: Vec<TrackId> = rows.iter().map(|r| r.track_id).collect();
        let credits = sqlx::query_as::<_, CreditRow>(
            r#"
            SELECT ta.track_id, a.id AS artist_id, a.name,
                   ta.is_primary, ta.position, ta.join_phrase
            FROM track_artists ta
            JOIN artists a ON a.id = ta.artist_id
            WHERE ta.track_id = ANY($1)
            ORDER BY ta.track_id, ta.position
            "#,
        )
        .bind(&track_ids)
        .fetch_all(&self.pool)
        .await?;

        let plays = rows
            .into_iter()
            .map(|row| {
                let artists = credits
                    .iter()
                    .filter(|c| c.track_id == row.track_id)
                    .cloned()
                    .collect();
                RecentPlay { row, artists }
            })
            .collect();
        Ok(plays)
    }

    /// Members of a group, one entry per stint.
    pub async fn group_members(&self, group_id: ArtistId) -> Result<Vec<MembershipEntry>> {
        let rows = sqlx::query_as::<_, MembershipEntry>(
            r#"
            SELECT m.id AS membership_id, a.id AS artist_id, a.name, a.mbid,
                   a.artist_type, a.image_url, m.begin_date, m.end_date,
                   m.begin_date_raw, m.end_date_raw, m.ended
            FROM artist_group_memberships m
            JOIN artists a ON a.id = m.member_id
            WHERE m.group_id = $1
            ORDER BY a.name, m.begin_date NULLS FIRST
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Groups a person has been part of, one entry per stint.
    pub async fn member_groups(&self, member_id: ArtistId) -> Result<Vec<MembershipEntry>> {
        let rows = sqlx::query_as::<_, MembershipEntry>(
            r#"
            SELECT m.id AS membership_id, a.id AS artist_id, a.name, a.mbid,
                   a.artist_type, a.image_url, m.begin_date, m.end_date,
                   m.begin_date_raw, m.end_date_raw, m.ended
            FROM artist_group_memberships m
            JOIN artists a ON a.id = m.group_id
            WHERE m.member_id = $1
            ORDER BY m.begin_date NULLS FIRST, a.name
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
