use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Implements text round-tripping for the enum columns stored as constrained strings.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant(other.to_string())),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: UnknownVariant| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryKind {
    News,
    Question,
}

text_enum!(StoryKind {
    News => "news",
    Question => "question",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Draft,
    Published,
}

text_enum!(StoryStatus {
    Draft => "draft",
    Published => "published",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceKind {
    Organizer,
    CoOrganizer,
    Speaker,
    Sponsor,
    Guest,
}

text_enum!(AttendanceKind {
    Organizer => "organizer",
    CoOrganizer => "co-organizer",
    Speaker => "speaker",
    Sponsor => "sponsor",
    Guest => "guest",
});

// --- Users ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub github_handle: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub github_handle: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub github_handle: Option<String>,
}

// --- Stories ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub kind: StoryKind,
    pub status: StoryStatus,
    pub author_profile_id: Option<String>,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub content: String,
    pub story_picture_uri: Option<String>,
    pub is_featured: bool,
    pub is_hidden: bool,
    pub is_anonymous: bool,
    pub answered_at: Option<String>,
    pub answered_at_uri: Option<String>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewStory {
    pub id: String,
    pub kind: StoryKind,
    pub status: StoryStatus,
    pub author_profile_id: Option<String>,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub content: String,
    pub story_picture_uri: Option<String>,
    pub is_featured: bool,
    pub is_hidden: bool,
    pub is_anonymous: bool,
    pub published_at: Option<String>,
}

impl NewStory {
    /// A published question owned by `author_id`.
    pub fn question(id: String, author_id: &str, content: &str, is_anonymous: bool) -> Self {
        Self {
            slug: slugify(&id),
            id,
            kind: StoryKind::Question,
            status: StoryStatus::Published,
            author_profile_id: Some(author_id.to_string()),
            title: String::new(),
            description: String::new(),
            summary: String::new(),
            content: content.to_string(),
            story_picture_uri: None,
            is_featured: false,
            is_hidden: false,
            is_anonymous,
            published_at: None,
        }
    }
}

/// Partial story update. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct StoryPatch {
    pub status: Option<StoryStatus>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub story_picture_uri: Option<Option<String>>,
    pub is_featured: Option<bool>,
    pub is_hidden: Option<bool>,
    pub is_anonymous: Option<bool>,
    pub answered_at: Option<Option<String>>,
    pub answered_at_uri: Option<Option<String>>,
    pub published_at: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryAuthor {
    pub id: String,
    pub name: String,
    pub github_handle: String,
}

/// A visible story joined with its author and aggregated vote scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryWithScores {
    pub id: String,
    pub kind: StoryKind,
    pub user: Option<StoryAuthor>,
    pub title: String,
    pub content: String,
    pub is_anonymous: bool,
    pub answered_at: Option<String>,
    pub answered_at_uri: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub score_sum_total: i64,
    pub score_sum_user: i64,
}

impl StoryWithScores {
    pub fn is_question(&self) -> bool {
        self.kind == StoryKind::Question
    }

    /// Author name as shown publicly; anonymous stories never reveal it.
    pub fn display_author(&self) -> &str {
        match (&self.user, self.is_anonymous) {
            (Some(user), false) => &user.name,
            _ => "Anonymous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryWithAuthor {
    #[serde(flatten)]
    pub story: Story,
    pub author_profile: Option<StoryAuthor>,
}

// --- Votes ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionVote {
    pub question_id: String,
    pub user_id: String,
    pub score: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewQuestionVote {
    pub question_id: String,
    pub user_id: String,
    pub score: i64,
}

// --- Event attendance ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendance {
    pub id: String,
    pub kind: AttendanceKind,
    pub event_id: String,
    pub profile_id: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEventAttendance {
    pub id: String,
    pub kind: AttendanceKind,
    pub event_id: String,
    pub profile_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventAttendancePatch {
    pub kind: Option<AttendanceKind>,
}

/// Lowercase ASCII slug: every run of characters outside `[a-z0-9]` becomes one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_run = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    slug
}
