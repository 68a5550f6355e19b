use agora::db::models::{
    AttendanceKind, NewEventAttendance, NewQuestionVote, NewStory, NewUser, StoryKind,
    StoryPatch, StoryStatus, User, UserPatch,
};
use agora::db::{self, new_id};
use agora::pagination::Cursor;
use agora::repositories::{
    AttendanceRepository, OwnedRepository, Repository, StoryRepository, UserRepository,
};
use agora::state::DbPool;
use rusqlite::params;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: DbPool,
    users: UserRepository,
    stories: StoryRepository,
    attendances: AttendanceRepository,
}

fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    Fixture {
        users: UserRepository::new(pool.clone()),
        stories: StoryRepository::new(pool.clone()),
        attendances: AttendanceRepository::new(pool.clone()),
        pool,
        _dir: dir,
    }
}

async fn create_user(fx: &Fixture, handle: &str) -> User {
    fx.users
        .create(NewUser {
            id: new_id(),
            name: format!("{} name", handle),
            github_handle: handle.to_string(),
        })
        .await
        .unwrap()
}

async fn create_question(fx: &Fixture, author: &User, content: &str, anonymous: bool) -> String {
    fx.stories
        .create(NewStory::question(new_id(), &author.id, content, anonymous))
        .await
        .unwrap()
        .id
}

fn news(author: &User, title: &str, status: StoryStatus) -> NewStory {
    NewStory {
        id: new_id(),
        kind: StoryKind::News,
        status,
        author_profile_id: Some(author.id.clone()),
        slug: agora::db::models::slugify(title),
        title: title.to_string(),
        description: String::new(),
        summary: String::new(),
        content: "body".to_string(),
        story_picture_uri: None,
        is_featured: false,
        is_hidden: false,
        is_anonymous: false,
        published_at: None,
    }
}

fn set_created_at(pool: &DbPool, id: &str, created_at: &str) {
    let conn = pool.get().unwrap();
    conn.execute(
        "UPDATE stories SET created_at = ?1 WHERE id = ?2",
        params![created_at, id],
    )
    .unwrap();
}

async fn vote(fx: &Fixture, question_id: &str, user: &User, score: i64) {
    fx.stories
        .upsert_vote(NewQuestionVote {
            question_id: question_id.to_string(),
            user_id: user.id.clone(),
            score,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_and_find_by_id() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;

    let found = fx.users.find_by_id(&ada.id).await.unwrap().unwrap();
    assert_eq!(found, ada);
    assert_eq!(found.deleted_at, None);
    assert!(fx.users.find_by_id("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleted_rows_are_invisible_to_reads() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let keep = create_question(&fx, &ada, "stays", false).await;
    let gone = create_question(&fx, &ada, "goes", false).await;

    let deleted = fx.stories.delete(&gone).await.unwrap().unwrap();
    assert!(deleted.deleted_at.is_some());

    assert!(fx.stories.find_by_id(&gone).await.unwrap().is_none());
    let ids: Vec<String> = fx
        .stories
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![keep.clone()]);

    let owned = fx.stories.find_all_by_owner(&ada.id).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, keep);
}

#[tokio::test]
async fn test_delete_missing_returns_none_and_repeat_delete_restamps() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let id = create_question(&fx, &ada, "twice", false).await;

    assert!(fx.stories.delete("missing").await.unwrap().is_none());

    let first = fx.stories.delete(&id).await.unwrap().unwrap();
    let second = fx.stories.delete(&id).await.unwrap().unwrap();
    assert!(first.deleted_at.is_some());
    assert!(second.deleted_at >= first.deleted_at);
}

#[tokio::test]
async fn test_update_applies_patch_and_stamps_updated_at() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let id = create_question(&fx, &ada, "original", false).await;

    let updated = fx
        .stories
        .update(
            &id,
            StoryPatch {
                content: Some("edited".to_string()),
                answered_at_uri: Some(Some("https://example.com/answer".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.content, "edited");
    assert_eq!(
        updated.answered_at_uri.as_deref(),
        Some("https://example.com/answer")
    );
    assert!(updated.updated_at.is_some());
    assert!(!updated.is_anonymous);

    let cleared = fx
        .stories
        .update(
            &id,
            StoryPatch {
                answered_at_uri: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.answered_at_uri, None);
    assert_eq!(cleared.content, "edited");
}

#[tokio::test]
async fn test_update_skips_deleted_rows() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    fx.users.delete(&ada.id).await.unwrap();

    let result = fx
        .users
        .update(
            &ada.id,
            UserPatch {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(fx.users.find_by_handle("ada").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_vote_keeps_one_row_with_latest_score() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let bob = create_user(&fx, "bob").await;
    let question = create_question(&fx, &ada, "votes?", false).await;

    vote(&fx, &question, &bob, 1).await;
    let second = fx
        .stories
        .upsert_vote(NewQuestionVote {
            question_id: question.clone(),
            user_id: bob.id.clone(),
            score: -1,
        })
        .await
        .unwrap();
    assert_eq!(second.score, -1);
    assert!(second.updated_at.is_some());

    let votes = fx.stories.find_all_votes_by_user(&bob.id).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].question_id, question);
    assert_eq!(votes[0].score, -1);
}

#[tokio::test]
async fn test_scores_rank_by_total_then_newest() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let user1 = create_user(&fx, "user1").await;
    let user2 = create_user(&fx, "user2").await;

    let a = create_question(&fx, &ada, "A", false).await;
    let b = create_question(&fx, &ada, "B", false).await;
    let older = create_question(&fx, &ada, "older", false).await;
    let newer = create_question(&fx, &ada, "newer", false).await;
    set_created_at(&fx.pool, &older, "2024-01-01T00:00:00.000Z");
    set_created_at(&fx.pool, &newer, "2024-01-02T00:00:00.000Z");

    vote(&fx, &a, &user1, 1).await;
    vote(&fx, &a, &user2, 1).await;
    vote(&fx, &b, &user1, 3).await;

    let ranked = fx.stories.find_all_with_scores(None).await.unwrap();
    let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![b.as_str(), a.as_str(), newer.as_str(), older.as_str()]);

    assert_eq!(ranked[0].score_sum_total, 3);
    assert_eq!(ranked[1].score_sum_total, 2);
    assert_eq!(ranked[2].score_sum_total, 0);
    assert!(ranked.iter().all(|s| s.score_sum_user == 0));
}

#[tokio::test]
async fn test_viewer_scores_are_zero_where_not_voted() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let user1 = create_user(&fx, "user1").await;
    let user2 = create_user(&fx, "user2").await;

    let a = create_question(&fx, &ada, "A", false).await;
    let b = create_question(&fx, &ada, "B", false).await;
    vote(&fx, &a, &user1, 1).await;
    vote(&fx, &a, &user2, 1).await;
    vote(&fx, &b, &user1, 3).await;

    let ranked = fx
        .stories
        .find_all_with_scores(Some(&user2.id))
        .await
        .unwrap();
    let score_for = |id: &str| {
        ranked
            .iter()
            .find(|s| s.id == id)
            .map(|s| (s.score_sum_total, s.score_sum_user))
            .unwrap()
    };
    assert_eq!(score_for(&a), (2, 1));
    assert_eq!(score_for(&b), (3, 0));
}

#[tokio::test]
async fn test_scored_listing_hides_hidden_and_deleted_stories() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let visible = create_question(&fx, &ada, "visible", false).await;
    let hidden = create_question(&fx, &ada, "hidden", false).await;
    let deleted = create_question(&fx, &ada, "deleted", false).await;

    fx.stories
        .update(
            &hidden,
            StoryPatch {
                is_hidden: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fx.stories.delete(&deleted).await.unwrap();

    let ranked = fx.stories.find_all_with_scores(None).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, visible);
    assert_eq!(ranked[0].user.as_ref().unwrap().github_handle, "ada");
}

#[tokio::test]
async fn test_owner_scores_leave_out_anonymous_questions() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let bob = create_user(&fx, "bob").await;

    let public = create_question(&fx, &ada, "public", false).await;
    let anonymous = create_question(&fx, &ada, "anonymous", true).await;
    create_question(&fx, &bob, "bob's", false).await;
    vote(&fx, &public, &bob, 2).await;
    vote(&fx, &anonymous, &bob, 5).await;

    let owned = fx
        .stories
        .find_all_by_owner_with_scores(&ada.id, Some(&bob.id))
        .await
        .unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, public);
    assert_eq!(owned[0].score_sum_total, 2);
    assert_eq!(owned[0].score_sum_user, 2);

    let everything = fx.stories.find_all_with_scores(None).await.unwrap();
    let anon = everything.iter().find(|s| s.id == anonymous).unwrap();
    assert_eq!(anon.display_author(), "Anonymous");
}

#[tokio::test]
async fn test_duplicate_attendance_is_a_unique_violation() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let event_id = new_id();

    let first = fx
        .attendances
        .create(NewEventAttendance {
            id: new_id(),
            kind: AttendanceKind::Speaker,
            event_id: event_id.clone(),
            profile_id: ada.id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(first.kind, AttendanceKind::Speaker);

    let err = fx
        .attendances
        .create(NewEventAttendance {
            id: new_id(),
            kind: AttendanceKind::Guest,
            event_id: event_id.clone(),
            profile_id: ada.id.clone(),
        })
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");

    let listed = fx.attendances.find_all_by_event(&event_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, first.id);
}

#[tokio::test]
async fn test_duplicate_github_handle_is_a_unique_violation() {
    let fx = setup();
    create_user(&fx, "ada").await;

    let err = fx
        .users
        .create(NewUser {
            id: new_id(),
            name: "Another Ada".to_string(),
            github_handle: "ada".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn test_published_page_walks_all_news_once() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;

    let mut expected = Vec::new();
    for i in 0..23 {
        let story = fx
            .stories
            .create(news(&ada, &format!("Story {}", i), StoryStatus::Published))
            .await
            .unwrap();
        expected.push(story.id);
    }
    fx.stories
        .create(news(&ada, "Draft", StoryStatus::Draft))
        .await
        .unwrap();
    create_question(&fx, &ada, "not news", false).await;
    expected.sort();
    expected.reverse();

    let mut seen = Vec::new();
    let mut cursor = Cursor::start(10);
    loop {
        let page = fx
            .stories
            .find_published_page(StoryKind::News, &cursor)
            .await
            .unwrap();
        assert!(page.items.len() <= 10);
        for item in &page.items {
            assert_eq!(item.author_profile.as_ref().unwrap().id, ada.id);
        }
        seen.extend(page.items.into_iter().map(|item| item.story.id));
        if page.cursor.is_empty() {
            break;
        }
        cursor = Cursor::new(page.cursor, 10);
    }

    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_user_pages_follow_id_order() {
    let fx = setup();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(create_user(&fx, &format!("user{}", i)).await.id);
    }
    ids.sort();

    let first = fx.users.find_page(&Cursor::start(3)).await.unwrap();
    assert_eq!(first.items.len(), 3);
    assert_eq!(first.cursor, ids[2]);

    let second = fx
        .users
        .find_page(&Cursor::new(first.cursor, 3))
        .await
        .unwrap();
    let second_ids: Vec<String> = second.items.into_iter().map(|u| u.id).collect();
    assert_eq!(second_ids, ids[3..].to_vec());
    assert!(second.cursor.is_empty());
}

#[tokio::test]
async fn test_scored_listings_respect_status_and_kind() {
    let fx = setup();
    let ada = create_user(&fx, "ada").await;
    let bob = create_user(&fx, "bob").await;

    let question = create_question(&fx, &ada, "question", false).await;
    let published = fx
        .stories
        .create(news(&ada, "Published", StoryStatus::Published))
        .await
        .unwrap()
        .id;
    let draft = fx
        .stories
        .create(news(&ada, "Draft", StoryStatus::Draft))
        .await
        .unwrap()
        .id;
    let draft_question = fx
        .stories
        .create(NewStory {
            status: StoryStatus::Draft,
            ..NewStory::question(new_id(), &ada.id, "unfinished", false)
        })
        .await
        .unwrap()
        .id;
    vote(&fx, &draft_question, &bob, 7).await;

    let all: Vec<String> = fx
        .stories
        .find_all_with_scores(None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(all.contains(&question));
    assert!(all.contains(&published));
    assert!(!all.contains(&draft));
    assert!(!all.contains(&draft_question));

    let owned: Vec<String> = fx
        .stories
        .find_all_by_owner_with_scores(&ada.id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(owned, vec![question]);
}
