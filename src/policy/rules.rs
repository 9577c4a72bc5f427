//! The per-entity access table.

use crate::auth::Role;

use super::{Action, Entity};

const ELEVATED: &[Role] = &[Role::Moderator, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];
const NOBODY: &[Role] = &[];

/// Who may perform one action on one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Anyone, including anonymous callers.
    pub everyone: bool,
    /// Anyone, when the resource is publicly visible.
    pub when_public: bool,
    /// Members of the resource's owner set.
    pub owner: bool,
    /// Roles allowed regardless of ownership.
    pub roles: &'static [Role],
}

impl Access {
    const fn new(roles: &'static [Role]) -> Self {
        Self {
            everyone: false,
            when_public: false,
            owner: false,
            roles,
        }
    }

    const EVERYONE: Access = Access {
        everyone: true,
        when_public: false,
        owner: false,
        roles: NOBODY,
    };

    /// Only the trusted back-office process.
    const SYSTEM_ONLY: Access = Access::new(NOBODY);

    const fn owner_or(roles: &'static [Role]) -> Self {
        Self {
            everyone: false,
            when_public: false,
            owner: true,
            roles,
        }
    }

    const fn public_or_owner(roles: &'static [Role]) -> Self {
        Self {
            everyone: false,
            when_public: true,
            owner: true,
            roles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub read: Access,
    pub create: Access,
    pub write: Access,
    pub delete: Access,
    /// Denied reads of non-public rows look like missing rows.
    pub conceal_when_private: bool,
}

impl Rule {
    pub fn access(&self, action: Action) -> &Access {
        match action {
            Action::Create => &self.create,
            Action::Read => &self.read,
            Action::Write => &self.write,
            Action::Delete => &self.delete,
        }
    }
}

const USER: Rule = Rule {
    read: Access::owner_or(ADMIN),
    create: Access::owner_or(NOBODY),
    write: Access::owner_or(ADMIN),
    delete: Access::SYSTEM_ONLY,
    conceal_when_private: false,
};

const PRODUCT: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::owner_or(NOBODY),
    write: Access::owner_or(ELEVATED),
    delete: Access::new(ADMIN),
    conceal_when_private: false,
};

const PRODUCT_EDITOR: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::new(ELEVATED),
    write: Access::new(ELEVATED),
    delete: Access::new(ELEVATED),
    conceal_when_private: false,
};

/// Owners here are the parent product's owners.
const PRODUCT_URL: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::owner_or(ELEVATED),
    write: Access::owner_or(ELEVATED),
    delete: Access::owner_or(ELEVATED),
    conceal_when_private: false,
};

const RATING: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::owner_or(NOBODY),
    write: Access::owner_or(NOBODY),
    delete: Access::owner_or(NOBODY),
    conceal_when_private: false,
};

const DISCUSSION: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::owner_or(NOBODY),
    write: Access::owner_or(ELEVATED),
    delete: Access::owner_or(ELEVATED),
    conceal_when_private: false,
};

const BLOG_POST: Rule = Rule {
    read: Access::public_or_owner(ADMIN),
    create: Access::new(ELEVATED),
    write: Access::owner_or(ADMIN),
    delete: Access::new(ADMIN),
    conceal_when_private: true,
};

const COLLECTION: Rule = Rule {
    read: Access::public_or_owner(NOBODY),
    create: Access::owner_or(NOBODY),
    write: Access::owner_or(NOBODY),
    delete: Access::owner_or(NOBODY),
    conceal_when_private: true,
};

const TAG: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::owner_or(NOBODY),
    write: Access::new(ADMIN),
    delete: Access::new(ADMIN),
    conceal_when_private: false,
};

const USER_ACTIVITY: Rule = Rule {
    read: Access::owner_or(ELEVATED),
    create: Access::SYSTEM_ONLY,
    write: Access::SYSTEM_ONLY,
    delete: Access::SYSTEM_ONLY,
    conceal_when_private: false,
};

const OPERATIONAL: Rule = Rule {
    read: Access::new(ELEVATED),
    create: Access::SYSTEM_ONLY,
    write: Access::SYSTEM_ONLY,
    delete: Access::SYSTEM_ONLY,
    conceal_when_private: false,
};

const SEARCH_TERMS: Rule = Rule {
    read: Access::new(ELEVATED),
    create: Access::new(ADMIN),
    write: Access::new(ADMIN),
    delete: Access::new(ADMIN),
    conceal_when_private: false,
};

const USER_REQUEST: Rule = Rule {
    read: Access::owner_or(ELEVATED),
    create: Access::owner_or(NOBODY),
    write: Access::new(ADMIN),
    delete: Access::new(ADMIN),
    conceal_when_private: false,
};

const REFERENCE_DATA: Rule = Rule {
    read: Access::EVERYONE,
    create: Access::new(ADMIN),
    write: Access::new(ADMIN),
    delete: Access::new(ADMIN),
    conceal_when_private: false,
};

pub fn rule_for(entity: Entity) -> &'static Rule {
    match entity {
        Entity::User => &USER,
        Entity::Product => &PRODUCT,
        Entity::ProductEditor => &PRODUCT_EDITOR,
        Entity::ProductUrl => &PRODUCT_URL,
        Entity::Rating => &RATING,
        Entity::Discussion => &DISCUSSION,
        Entity::BlogPost => &BLOG_POST,
        Entity::Collection => &COLLECTION,
        Entity::Tag => &TAG,
        Entity::UserActivity => &USER_ACTIVITY,
        Entity::ScrapingLog | Entity::OAuthConfig => &OPERATIONAL,
        Entity::ScraperSearchTerms => &SEARCH_TERMS,
        Entity::UserRequest => &USER_REQUEST,
        Entity::ReferenceData => &REFERENCE_DATA,
    }
}
