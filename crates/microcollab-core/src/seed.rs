//! Fixed seed corpus for the demo marketplace.
//!
//! Everything the simulation shows comes from here: the user pool, the
//! request templates used both for the initial listing and for newly
//! posted requests, and the canned offer messages. The initial listing is
//! deterministic; only the generator draws from the corpus at random.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use microcollab_types::{
    Budget, Mode, Offer, OfferId, OfferStatus, Request, RequestDraft, RequestId, RequestStatus,
    Urgency, UserId, UserSummary,
};
use rust_decimal::Decimal;

/// A request blueprint from the corpus.
#[derive(Debug, Clone, Copy)]
pub struct RequestTemplate {
    /// Request title.
    pub title: &'static str,
    /// Request description.
    pub description: &'static str,
    /// Technology tags.
    pub tags: &'static [&'static str],
    /// Urgency.
    pub urgency: Urgency,
    /// Collaboration mode.
    pub mode: Mode,
    /// Session length in hours.
    pub duration_hours: u8,
    /// Budget in cents (USD), if any.
    pub budget_cents: Option<i64>,
}

impl RequestTemplate {
    /// Turn this template into a validated-shape draft.
    pub fn to_draft(&self) -> RequestDraft {
        RequestDraft {
            title: self.title.to_owned(),
            description: self.description.to_owned(),
            tags: self.tags.iter().map(|tag| (*tag).to_owned()).collect(),
            urgency: self.urgency,
            mode: self.mode,
            duration_hours: self.duration_hours,
            budget: self.budget_cents.map(|cents| Budget {
                amount: Decimal::new(cents, 2),
                currency: String::from("USD"),
            }),
        }
    }
}

/// Request templates. The first twelve make up the initial listing.
pub const REQUEST_TEMPLATES: &[RequestTemplate] = &[
    RequestTemplate {
        title: "Borrow checker fight in async closure",
        description: "A spawned task needs a reference to request state and the compiler keeps asking for 'static.",
        tags: &["rust", "async", "tokio"],
        urgency: Urgency::Critical,
        mode: Mode::Live,
        duration_hours: 1,
        budget_cents: Some(8_000),
    },
    RequestTemplate {
        title: "Hydration mismatch after adding dark mode",
        description: "Server and client render different class names for the theme toggle.",
        tags: &["react", "nextjs", "ssr"],
        urgency: Urgency::Normal,
        mode: Mode::Async,
        duration_hours: 1,
        budget_cents: Some(4_500),
    },
    RequestTemplate {
        title: "Postgres query slows down past 1M rows",
        description: "An ORDER BY with OFFSET pagination went from 20ms to 4s. Looking for an indexing review.",
        tags: &["postgres", "sql", "performance"],
        urgency: Urgency::Critical,
        mode: Mode::Live,
        duration_hours: 2,
        budget_cents: Some(15_000),
    },
    RequestTemplate {
        title: "Set up GitHub Actions matrix for monorepo",
        description: "Only changed packages should be tested. Current workflow rebuilds everything.",
        tags: &["ci", "github-actions", "devops"],
        urgency: Urgency::Low,
        mode: Mode::Async,
        duration_hours: 2,
        budget_cents: None,
    },
    RequestTemplate {
        title: "Review Terraform module structure",
        description: "Want a second pair of eyes on how state and environments are split.",
        tags: &["terraform", "aws", "devops"],
        urgency: Urgency::Low,
        mode: Mode::Live,
        duration_hours: 3,
        budget_cents: Some(20_000),
    },
    RequestTemplate {
        title: "TypeScript generic inference gives up",
        description: "A builder type collapses to unknown after the third chained call.",
        tags: &["typescript", "types"],
        urgency: Urgency::Normal,
        mode: Mode::Async,
        duration_hours: 1,
        budget_cents: None,
    },
    RequestTemplate {
        title: "Flaky Playwright test on CI only",
        description: "Passes locally every time, fails one run in five on CI with a timeout.",
        tags: &["testing", "playwright", "ci"],
        urgency: Urgency::Normal,
        mode: Mode::Live,
        duration_hours: 1,
        budget_cents: Some(6_000),
    },
    RequestTemplate {
        title: "Design review for event-sourced billing",
        description: "Deciding between snapshots per aggregate and a projection table.",
        tags: &["architecture", "event-sourcing"],
        urgency: Urgency::Low,
        mode: Mode::Live,
        duration_hours: 4,
        budget_cents: Some(40_000),
    },
    RequestTemplate {
        title: "Docker image is 2GB, needs slimming",
        description: "Python service image with build tools left in. Multi-stage help wanted.",
        tags: &["docker", "python", "devops"],
        urgency: Urgency::Normal,
        mode: Mode::Async,
        duration_hours: 1,
        budget_cents: Some(3_000),
    },
    RequestTemplate {
        title: "Memory leak in Node worker",
        description: "Heap grows steadily under load; snapshots point at a closure in the queue consumer.",
        tags: &["node", "performance", "debugging"],
        urgency: Urgency::Critical,
        mode: Mode::Live,
        duration_hours: 2,
        budget_cents: Some(12_000),
    },
    RequestTemplate {
        title: "Pair on first Kubernetes deployment",
        description: "Helm chart renders but pods crash-loop on a missing secret.",
        tags: &["kubernetes", "helm", "devops"],
        urgency: Urgency::Normal,
        mode: Mode::Live,
        duration_hours: 3,
        budget_cents: None,
    },
    RequestTemplate {
        title: "GraphQL N+1 in resolvers",
        description: "Nested list resolvers fire one query per row. Looking for a dataloader walkthrough.",
        tags: &["graphql", "performance", "node"],
        urgency: Urgency::Low,
        mode: Mode::Async,
        duration_hours: 2,
        budget_cents: Some(7_500),
    },
    RequestTemplate {
        title: "WebSocket reconnect storms after deploy",
        description: "Every client reconnects at once after a rollout and the gateway falls over.",
        tags: &["websockets", "architecture"],
        urgency: Urgency::Critical,
        mode: Mode::Live,
        duration_hours: 2,
        budget_cents: Some(18_000),
    },
    RequestTemplate {
        title: "Tailwind classes not purged in production",
        description: "Production CSS bundle still contains every utility class.",
        tags: &["css", "tailwind", "nextjs"],
        urgency: Urgency::Low,
        mode: Mode::Async,
        duration_hours: 1,
        budget_cents: None,
    },
    RequestTemplate {
        title: "Rust FFI segfault calling C library",
        description: "Passing a Vec's pointer to a C callback crashes after the first invocation.",
        tags: &["rust", "ffi", "debugging"],
        urgency: Urgency::Critical,
        mode: Mode::Live,
        duration_hours: 2,
        budget_cents: Some(10_000),
    },
    RequestTemplate {
        title: "Migrate Redux store to server components",
        description: "Need a plan for which slices move to the server and which stay client-side.",
        tags: &["react", "nextjs", "architecture"],
        urgency: Urgency::Normal,
        mode: Mode::Live,
        duration_hours: 3,
        budget_cents: Some(22_000),
    },
];

/// Canned offer messages.
pub const OFFER_MESSAGES: &[&str] = &[
    "I've fixed this exact issue twice this month. Happy to jump on a call.",
    "Can take a look right away. Share a repro repo if you have one.",
    "This looks like a lifetime issue in the setup code. I can walk you through it.",
    "I maintain a library in this area and know the sharp edges well.",
    "Quick one I think. 30 minutes should be enough to get you unblocked.",
    "Let's pair on it. I'll explain the why as we go so it sticks.",
];

/// Canned helper availability labels.
pub const AVAILABILITY_LABELS: &[&str] = &[
    "available now",
    "in 15 min",
    "in 1 hour",
    "this afternoon",
    "tomorrow morning",
];

/// Static profile data for the seed user pool.
struct UserSeed {
    name: &'static str,
    avatar: &'static str,
    rating_tenths: i64,
    sessions_completed: u32,
    skills: &'static [&'static str],
}

const USER_SEEDS: &[UserSeed] = &[
    UserSeed {
        name: "Ada Park",
        avatar: "AP",
        rating_tenths: 49,
        sessions_completed: 132,
        skills: &["rust", "async", "performance"],
    },
    UserSeed {
        name: "Mateo Ruiz",
        avatar: "MR",
        rating_tenths: 47,
        sessions_completed: 88,
        skills: &["react", "nextjs", "typescript"],
    },
    UserSeed {
        name: "Priya Nair",
        avatar: "PN",
        rating_tenths: 50,
        sessions_completed: 210,
        skills: &["postgres", "sql", "architecture"],
    },
    UserSeed {
        name: "Jonas Weber",
        avatar: "JW",
        rating_tenths: 45,
        sessions_completed: 41,
        skills: &["devops", "kubernetes", "terraform"],
    },
    UserSeed {
        name: "Keiko Sato",
        avatar: "KS",
        rating_tenths: 48,
        sessions_completed: 97,
        skills: &["testing", "playwright", "ci"],
    },
    UserSeed {
        name: "Sam Okafor",
        avatar: "SO",
        rating_tenths: 46,
        sessions_completed: 63,
        skills: &["node", "graphql", "debugging"],
    },
    UserSeed {
        name: "Lena Petrova",
        avatar: "LP",
        rating_tenths: 49,
        sessions_completed: 154,
        skills: &["docker", "python", "devops"],
    },
    UserSeed {
        name: "Noah Brooks",
        avatar: "NB",
        rating_tenths: 44,
        sessions_completed: 19,
        skills: &["css", "tailwind", "react"],
    },
];

/// Build the seed user pool. IDs are fresh on every call.
pub fn seed_users() -> Vec<UserSummary> {
    USER_SEEDS
        .iter()
        .map(|seed| UserSummary {
            id: UserId::new(),
            name: seed.name.to_owned(),
            avatar: seed.avatar.to_owned(),
            rating: Decimal::new(seed.rating_tenths, 1),
            sessions_completed: seed.sessions_completed,
            skills: seed.skills.iter().map(|s| (*s).to_owned()).collect(),
        })
        .collect()
}

/// Build an open request with no offers from a draft.
pub fn request_from_draft(
    draft: RequestDraft,
    requester: UserSummary,
    created_at: DateTime<Utc>,
) -> Request {
    Request {
        id: RequestId::new(),
        title: draft.title,
        description: draft.description,
        tags: draft.tags,
        urgency: draft.urgency,
        mode: draft.mode,
        duration_hours: draft.duration_hours,
        budget: draft.budget,
        created_at,
        status: RequestStatus::Open,
        requester,
        offers: Vec::new(),
    }
}

/// Build a pending offer on `request_id`.
pub fn pending_offer(
    request_id: RequestId,
    helper: UserSummary,
    message: String,
    availability: String,
    created_at: DateTime<Utc>,
) -> Offer {
    Offer {
        id: OfferId::new(),
        request_id,
        helper,
        message,
        availability,
        created_at,
        status: OfferStatus::Pending,
    }
}

/// Build the deterministic initial listing of `count` open requests.
///
/// Templates and requesters are taken in order (cycling when `count`
/// exceeds the corpus). Request `i` is backdated by `i * 17 + 5` minutes so
/// index 0 is the newest. Every third request arrives with one pending
/// offer from the next user in the pool.
pub fn initial_requests(users: &[UserSummary], count: usize, now: DateTime<Utc>) -> Vec<Request> {
    if users.is_empty() {
        return Vec::new();
    }

    let requesters = users.iter().cycle();
    let helpers = users.iter().cycle().skip(1);
    let messages = OFFER_MESSAGES.iter().cycle();
    let labels = AVAILABILITY_LABELS.iter().cycle();

    REQUEST_TEMPLATES
        .iter()
        .cycle()
        .zip(requesters)
        .zip(helpers)
        .zip(messages.zip(labels))
        .take(count)
        .enumerate()
        .map(|(index, (((template, requester), helper), (message, label)))| {
            let minutes = i64::try_from(index)
                .unwrap_or(i64::MAX)
                .saturating_mul(17)
                .saturating_add(5);
            let created_at = now
                .checked_sub_signed(TimeDelta::minutes(minutes))
                .unwrap_or(now);
            let mut request = request_from_draft(template.to_draft(), requester.clone(), created_at);
            if index % 3 == 0 {
                let offered_at = created_at
                    .checked_add_signed(TimeDelta::minutes(2))
                    .unwrap_or(created_at);
                request.offers.push(pending_offer(
                    request.id,
                    helper.clone(),
                    (*message).to_owned(),
                    (*label).to_owned(),
                    offered_at,
                ));
            }
            request
        })
        .collect()
}

/// Tags present anywhere in the corpus, for populating filter pickers.
pub fn known_tags() -> BTreeSet<String> {
    REQUEST_TEMPLATES
        .iter()
        .flat_map(|template| template.tags.iter())
        .map(|tag| (*tag).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn every_template_is_a_valid_draft() {
        for template in REQUEST_TEMPLATES {
            assert!(template.to_draft().validate().is_ok(), "{}", template.title);
        }
    }

    #[test]
    fn initial_listing_is_deterministic_and_open() {
        let users = seed_users();
        let now = Utc::now();
        let requests = initial_requests(&users, 12, now);
        assert_eq!(requests.len(), 12);
        assert!(requests.iter().all(|r| r.status == RequestStatus::Open));
        let titles: Vec<&str> = requests.iter().map(|r| r.title.as_str()).collect();
        let expected: Vec<&str> = REQUEST_TEMPLATES.iter().take(12).map(|t| t.title).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn initial_listing_is_newest_first() {
        let users = seed_users();
        let requests = initial_requests(&users, 12, Utc::now());
        for pair in requests.windows(2) {
            if let [newer, older] = pair {
                assert!(newer.created_at > older.created_at);
            }
        }
    }

    #[test]
    fn every_third_request_has_one_offer_from_someone_else() {
        let users = seed_users();
        let requests = initial_requests(&users, 12, Utc::now());
        let with_offers = requests.iter().filter(|r| !r.offers.is_empty()).count();
        assert_eq!(with_offers, 4);
        for request in &requests {
            for offer in &request.offers {
                assert_ne!(offer.helper.id, request.requester.id);
                assert_eq!(offer.request_id, request.id);
                assert_eq!(offer.status, OfferStatus::Pending);
            }
        }
    }

    #[test]
    fn count_beyond_corpus_cycles() {
        let users = seed_users();
        let requests = initial_requests(&users, REQUEST_TEMPLATES.len() + 3, Utc::now());
        assert_eq!(requests.len(), REQUEST_TEMPLATES.len() + 3);
    }

    #[test]
    fn empty_pool_yields_no_requests() {
        assert!(initial_requests(&[], 12, Utc::now()).is_empty());
    }

    #[test]
    fn known_tags_cover_filters_used_in_tests() {
        let tags = known_tags();
        assert!(tags.contains("rust"));
        assert!(tags.contains("devops"));
    }
}
