use rusqlite::types::Value;
use rusqlite::{params, Row};

use super::{qualified_columns, Entity, IntoColumns, Owned, RepoResult, SqliteRepository};
use crate::db::models::{
    NewQuestionVote, NewStory, QuestionVote, Story, StoryAuthor, StoryKind, StoryPatch,
    StoryWithAuthor, StoryWithScores,
};
use crate::db::NOW;
use crate::pagination::{Cursor, Page};

impl Entity for Story {
    const TABLE: &'static str = "stories";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "kind",
        "status",
        "author_profile_id",
        "slug",
        "title",
        "description",
        "summary",
        "content",
        "story_picture_uri",
        "is_featured",
        "is_hidden",
        "is_anonymous",
        "answered_at",
        "answered_at_uri",
        "published_at",
        "created_at",
        "updated_at",
        "deleted_at",
    ];

    type New = NewStory;
    type Patch = StoryPatch;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Story {
            id: row.get(0)?,
            kind: row.get(1)?,
            status: row.get(2)?,
            author_profile_id: row.get(3)?,
            slug: row.get(4)?,
            title: row.get(5)?,
            description: row.get(6)?,
            summary: row.get(7)?,
            content: row.get(8)?,
            story_picture_uri: row.get(9)?,
            is_featured: row.get(10)?,
            is_hidden: row.get(11)?,
            is_anonymous: row.get(12)?,
            answered_at: row.get(13)?,
            answered_at_uri: row.get(14)?,
            published_at: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
            deleted_at: row.get(18)?,
        })
    }
}

impl Owned for Story {
    const OWNER_COLUMN: &'static str = "author_profile_id";
}

impl IntoColumns for NewStory {
    fn into_columns(self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("kind", self.kind.as_str().to_string().into()),
            ("status", self.status.as_str().to_string().into()),
            ("author_profile_id", self.author_profile_id.into()),
            ("slug", self.slug.into()),
            ("title", self.title.into()),
            ("description", self.description.into()),
            ("summary", self.summary.into()),
            ("content", self.content.into()),
            ("story_picture_uri", self.story_picture_uri.into()),
            ("is_featured", self.is_featured.into()),
            ("is_hidden", self.is_hidden.into()),
            ("is_anonymous", self.is_anonymous.into()),
            ("published_at", self.published_at.into()),
        ]
    }
}

impl IntoColumns for StoryPatch {
    fn into_columns(self) -> Vec<(&'static str, Value)> {
        let mut columns: Vec<(&'static str, Value)> = Vec::new();
        if let Some(status) = self.status {
            columns.push(("status", status.as_str().to_string().into()));
        }
        let text_fields = [
            ("slug", self.slug),
            ("title", self.title),
            ("description", self.description),
            ("summary", self.summary),
            ("content", self.content),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value {
                columns.push((name, value.into()));
            }
        }
        let flags = [
            ("is_featured", self.is_featured),
            ("is_hidden", self.is_hidden),
            ("is_anonymous", self.is_anonymous),
        ];
        for (name, value) in flags {
            if let Some(value) = value {
                columns.push((name, value.into()));
            }
        }
        let nullable = [
            ("story_picture_uri", self.story_picture_uri),
            ("answered_at", self.answered_at),
            ("answered_at_uri", self.answered_at_uri),
            ("published_at", self.published_at),
        ];
        for (name, value) in nullable {
            if let Some(value) = value {
                columns.push((name, value.into()));
            }
        }
        columns
    }
}

const VOTE_COLUMNS: &str = "question_id, user_id, score, created_at, updated_at";

fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<QuestionVote> {
    Ok(QuestionVote {
        question_id: row.get(0)?,
        user_id: row.get(1)?,
        score: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Reads a nullable joined author starting at column `offset`.
fn author_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Option<StoryAuthor>> {
    let id: Option<String> = row.get(offset)?;
    match id {
        Some(id) => Ok(Some(StoryAuthor {
            id,
            name: row.get(offset + 1)?,
            github_handle: row.get(offset + 2)?,
        })),
        None => Ok(None),
    }
}

fn scored_from_row(row: &Row<'_>) -> rusqlite::Result<StoryWithScores> {
    Ok(StoryWithScores {
        id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        is_anonymous: row.get(4)?,
        answered_at: row.get(5)?,
        answered_at_uri: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        user: author_from_row(row, 9)?,
        score_sum_total: row.get(12)?,
        score_sum_user: row.get(13)?,
    })
}

/// Published, visible stories joined with their author and vote sums. `?1` is
/// the viewing user (NULL for none); `filter` is appended to the WHERE clause.
fn scored_sql(filter: &str) -> String {
    format!(
        "SELECT s.id, s.kind, s.title, s.content, s.is_anonymous,
                s.answered_at, s.answered_at_uri, s.created_at, s.updated_at,
                u.id, u.name, u.github_handle,
                CAST(COALESCE(SUM(v.score), 0) AS INTEGER) AS total_score_sum,
                CAST(COALESCE(SUM(CASE WHEN v.user_id = ?1 THEN v.score ELSE 0 END), 0) AS INTEGER) AS user_score_sum
         FROM stories s
         LEFT JOIN users u ON u.id = s.author_profile_id
         LEFT JOIN question_votes v ON v.question_id = s.id
         WHERE s.status = 'published' AND s.is_hidden = 0 AND s.deleted_at IS NULL {}
         GROUP BY s.id
         ORDER BY total_score_sum DESC, s.created_at DESC, s.id DESC",
        filter
    )
}

impl SqliteRepository<Story> {
    /// Insert a vote, or overwrite the score of the voter's existing vote on the question.
    pub async fn upsert_vote(&self, vote: NewQuestionVote) -> RepoResult<QuestionVote> {
        let conn = self.pool.get()?;
        let sql = format!(
            "INSERT INTO question_votes (question_id, user_id, score) VALUES (?1, ?2, ?3)
             ON CONFLICT(question_id, user_id) DO UPDATE SET
               score = excluded.score,
               updated_at = {}
             RETURNING {}",
            NOW, VOTE_COLUMNS
        );
        let row = conn.query_row(
            &sql,
            params![vote.question_id, vote.user_id, vote.score],
            vote_from_row,
        )?;
        Ok(row)
    }

    pub async fn find_all_votes_by_user(&self, user_id: &str) -> RepoResult<Vec<QuestionVote>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM question_votes WHERE user_id = ?1 ORDER BY created_at",
            VOTE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], vote_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Published, visible stories ranked by total score, newest first among equal scores.
    pub async fn find_all_with_scores(
        &self,
        viewing_user_id: Option<&str>,
    ) -> RepoResult<Vec<StoryWithScores>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&scored_sql(""))?;
        let rows = stmt
            .query_map(params![viewing_user_id], scored_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Same ranking restricted to one owner's questions, leaving out anonymous ones.
    pub async fn find_all_by_owner_with_scores(
        &self,
        owner_id: &str,
        viewing_user_id: Option<&str>,
    ) -> RepoResult<Vec<StoryWithScores>> {
        let conn = self.pool.get()?;
        let sql = scored_sql(
            "AND s.kind = 'question' AND s.author_profile_id = ?2 AND s.is_anonymous = 0",
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![viewing_user_id, owner_id], scored_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Published, visible stories of `kind` with their author, newest first.
    /// The cursor is the id of the last story on the previous page.
    pub async fn find_published_page(
        &self,
        kind: StoryKind,
        cursor: &Cursor,
    ) -> RepoResult<Page<StoryWithAuthor>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {}, u.id, u.name, u.github_handle
             FROM stories s
             LEFT JOIN users u ON u.id = s.author_profile_id
             WHERE s.kind = ?1 AND s.status = 'published'
               AND s.is_hidden = 0 AND s.deleted_at IS NULL
               AND (?2 = '' OR s.id < ?2)
             ORDER BY s.id DESC
             LIMIT ?3",
            qualified_columns::<Story>("s")
        );
        let author_offset = Story::COLUMNS.len();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![kind, cursor.value, cursor.fetch_limit()], |row| {
                Ok(StoryWithAuthor {
                    story: Story::from_row(row)?,
                    author_profile: author_from_row(row, author_offset)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::from_overfetch(rows, cursor, |row| row.story.id.clone()))
    }
}
