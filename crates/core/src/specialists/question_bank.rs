//! # Question Bank
//!
//! Canned discovery questions for each specialist. Ids line up with the
//! default `required_questions` table in [`PanelConfig`]; entries not listed
//! there are optional follow-ups.
//!
//! [`PanelConfig`]: crate::panel::config::PanelConfig

use super::SpecialistId;

/// One canned question
#[derive(Debug, Clone, Copy)]
pub struct BankEntry {
    pub id: &'static str,
    pub owner: SpecialistId,
    pub content: &'static str,
    pub options: &'static [&'static str],
}

const fn entry(id: &'static str, owner: SpecialistId, content: &'static str) -> BankEntry {
    BankEntry {
        id,
        owner,
        content,
        options: &[],
    }
}

use SpecialistId::*;

static BANK: &[BankEntry] = &[
    // product manager
    entry(
        "product_problem",
        ProductManager,
        "What problem are you trying to solve, and for whom does it hurt most?",
    ),
    entry(
        "product_users",
        ProductManager,
        "Who are the primary users, and how do they deal with this problem today?",
    ),
    entry(
        "product_goals",
        ProductManager,
        "What does success look like? Which outcomes would you measure?",
    ),
    entry(
        "product_scope",
        ProductManager,
        "What must the first release include, and what is explicitly out of scope?",
    ),
    BankEntry {
        id: "product_timeline",
        owner: ProductManager,
        content: "Is there a target date or milestone driving this work?",
        options: &["weeks", "months", "no fixed date"],
    },
    // ux designer
    entry(
        "design_flows",
        UxDesigner,
        "Walk me through the main user journey from first touch to the moment of value.",
    ),
    entry(
        "design_screens",
        UxDesigner,
        "Which screens or views are essential, and what does each one need to show?",
    ),
    BankEntry {
        id: "design_style",
        owner: UxDesigner,
        content: "What visual tone should the product have?",
        options: &["minimal", "playful", "enterprise", "match an existing brand"],
    },
    entry(
        "design_accessibility",
        UxDesigner,
        "Are there accessibility or device requirements we must meet?",
    ),
    // database architect
    entry(
        "data_entities",
        DatabaseArchitect,
        "What are the core things the system stores (users, orders, documents...)?",
    ),
    entry(
        "data_relationships",
        DatabaseArchitect,
        "How do those entities relate to each other? Note any one-to-many or many-to-many links.",
    ),
    BankEntry {
        id: "data_storage",
        owner: DatabaseArchitect,
        content: "What kind of storage fits best?",
        options: &["relational", "document", "key-value", "no preference"],
    },
    entry(
        "data_retention",
        DatabaseArchitect,
        "How long must data be kept, and are there privacy or deletion rules?",
    ),
    // software engineer
    entry(
        "eng_stack",
        SoftwareEngineer,
        "Which languages, frameworks or platforms are you committed to or prefer?",
    ),
    entry(
        "eng_components",
        SoftwareEngineer,
        "What are the main components or modules you expect the system to have?",
    ),
    entry(
        "eng_integrations",
        SoftwareEngineer,
        "Which external services or APIs does this need to talk to?",
    ),
    entry(
        "eng_testing",
        SoftwareEngineer,
        "How will you know it works? Any testing or quality expectations?",
    ),
    // user researcher
    entry(
        "research_audience",
        UserResearcher,
        "Describe the audience: roles, experience level, and how often they would use this.",
    ),
    entry(
        "research_pain_points",
        UserResearcher,
        "What frustrates these users most about the current situation?",
    ),
    entry(
        "research_goals",
        UserResearcher,
        "What are users ultimately trying to achieve when they reach for this?",
    ),
    entry(
        "research_context",
        UserResearcher,
        "Where and when do they use it: at a desk, on the go, under time pressure?",
    ),
    entry(
        "research_competitors",
        UserResearcher,
        "Which alternatives do users consider, and what do they like or dislike about them?",
    ),
    // business analyst
    BankEntry {
        id: "business_model",
        owner: BusinessAnalyst,
        content: "How will this make or save money?",
        options: &["subscription", "one-time purchase", "usage-based", "internal cost saving"],
    },
    entry(
        "business_market",
        BusinessAnalyst,
        "How large is the market, and who else competes for it?",
    ),
    entry(
        "business_metrics",
        BusinessAnalyst,
        "Which business metrics would tell you this is working?",
    ),
    entry(
        "business_risks",
        BusinessAnalyst,
        "What are the biggest business risks or assumptions to validate?",
    ),
    // solution architect
    entry(
        "arch_components",
        SolutionArchitect,
        "Which major systems make up the solution, and how do they communicate?",
    ),
    BankEntry {
        id: "arch_deployment",
        owner: SolutionArchitect,
        content: "Where will this run?",
        options: &["cloud", "on-premises", "hybrid", "desktop or mobile only"],
    },
    entry(
        "arch_constraints",
        SolutionArchitect,
        "What constraints apply: scale, latency, compliance, budget?",
    ),
    entry(
        "arch_security",
        SolutionArchitect,
        "What are the authentication and data protection requirements?",
    ),
];

/// Every entry, in bank order
pub fn all() -> &'static [BankEntry] {
    BANK
}

/// Entries owned by one specialist, in bank order
pub fn for_specialist(specialist: SpecialistId) -> impl Iterator<Item = &'static BankEntry> {
    BANK.iter().filter(move |e| e.owner == specialist)
}

pub fn find(id: &str) -> Option<&'static BankEntry> {
    BANK.iter().find(|e| e.id == id)
}
