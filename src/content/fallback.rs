//! Default payloads, one entry per content kind.
//!
//! These are the only hardcoded content rows in the service. `ContentStore`
//! serves them whenever a live read yields no usable rows.

use super::{
    models::{
        AboutSection, Announcement, Facility, FooterLink, FooterSection, GalleryItem,
        HeroSection, LeadershipMember, LearningMaterial, VisionSection,
    },
    ContentKind, ContentRecord,
};
use serde_json::Value;

/// Fallback rows for `kind` as JSON.
#[must_use]
pub fn payload(kind: ContentKind) -> Vec<Value> {
    match kind {
        ContentKind::Hero => to_values(HeroSection::fallback()),
        ContentKind::About => to_values(AboutSection::fallback()),
        ContentKind::Vision => to_values(VisionSection::fallback()),
        ContentKind::Announcements => to_values(Announcement::fallback()),
        ContentKind::Gallery => to_values(GalleryItem::fallback()),
        ContentKind::Materials => to_values(LearningMaterial::fallback()),
        ContentKind::Leadership => to_values(LeadershipMember::fallback()),
        ContentKind::Facilities => to_values(Facility::fallback()),
        ContentKind::Footer => to_values(FooterSection::fallback()),
    }
}

fn to_values<T: ContentRecord>(rows: Vec<T>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| serde_json::to_value(row).ok())
        .collect()
}

fn text(value: &str) -> Option<String> {
    Some(value.to_string())
}

impl ContentRecord for HeroSection {
    const KIND: ContentKind = ContentKind::Hero;

    fn fallback() -> Vec<Self> {
        vec![Self {
            id: None,
            title: "Welcome to Our School".to_string(),
            subtitle: text("Nurturing curious minds and caring hearts since 1965"),
            background_image_url: text("/images/hero-campus.jpg"),
            cta_text: text("Learn More"),
            cta_link: text("#about"),
            is_active: Some(true),
        }]
    }
}

impl ContentRecord for AboutSection {
    const KIND: ContentKind = ContentKind::About;

    fn fallback() -> Vec<Self> {
        vec![Self {
            id: None,
            title: "About Us".to_string(),
            content: "We are a community school committed to quality education, \
                      character formation and service to our neighbourhood."
                .to_string(),
            image_url: text("/images/about-school.jpg"),
            is_active: Some(true),
        }]
    }
}

impl ContentRecord for VisionSection {
    const KIND: ContentKind = ContentKind::Vision;

    fn fallback() -> Vec<Self> {
        vec![Self {
            id: None,
            vision: "A school where every learner grows into a responsible, \
                     compassionate and competent citizen."
                .to_string(),
            mission: "To provide accessible, learner-centred education in a safe \
                      and supportive environment."
                .to_string(),
            core_values: vec![
                "Excellence".to_string(),
                "Integrity".to_string(),
                "Respect".to_string(),
                "Service".to_string(),
            ],
            is_active: Some(true),
        }]
    }
}

impl ContentRecord for Announcement {
    const KIND: ContentKind = ContentKind::Announcements;

    fn fallback() -> Vec<Self> {
        vec![
            Self {
                id: None,
                title: "Enrollment Is Open".to_string(),
                content: "Enrollment for the upcoming school year is now open. \
                          Visit the registrar's office for requirements."
                    .to_string(),
                date: None,
                category: text("Enrollment"),
                is_active: Some(true),
                created_at: None,
            },
            Self {
                id: None,
                title: "Parent-Teacher Conference".to_string(),
                content: "Parents are invited to meet their children's advisers \
                          at the end of the first quarter."
                    .to_string(),
                date: None,
                category: text("Events"),
                is_active: Some(true),
                created_at: None,
            },
        ]
    }
}

impl ContentRecord for GalleryItem {
    const KIND: ContentKind = ContentKind::Gallery;

    fn fallback() -> Vec<Self> {
        [
            ("Campus Grounds", "/images/gallery/campus.jpg", "Campus"),
            ("Science Fair", "/images/gallery/science-fair.jpg", "Events"),
            ("Sports Festival", "/images/gallery/sports.jpg", "Sports"),
        ]
        .into_iter()
        .zip(1..)
        .map(|((title, image_url, category), display_order)| Self {
            id: None,
            title: title.to_string(),
            description: None,
            image_url: image_url.to_string(),
            category: text(category),
            display_order: Some(display_order),
            is_active: Some(true),
        })
        .collect()
    }
}

impl ContentRecord for LearningMaterial {
    const KIND: ContentKind = ContentKind::Materials;

    fn fallback() -> Vec<Self> {
        vec![Self {
            id: None,
            title: "School Calendar".to_string(),
            description: text("Important dates for the current school year."),
            file_url: "/materials/school-calendar.pdf".to_string(),
            subject: text("General"),
            grade_level: text("All"),
            is_active: Some(true),
            created_at: None,
        }]
    }
}

impl ContentRecord for LeadershipMember {
    const KIND: ContentKind = ContentKind::Leadership;

    fn fallback() -> Vec<Self> {
        [
            ("School Principal", "Principal"),
            ("Assistant Principal", "Assistant Principal"),
        ]
        .into_iter()
        .zip(1..)
        .map(|((name, position), display_order)| Self {
            id: None,
            name: name.to_string(),
            position: position.to_string(),
            bio: None,
            image_url: None,
            display_order: Some(display_order),
            is_active: Some(true),
        })
        .collect()
    }
}

impl ContentRecord for Facility {
    const KIND: ContentKind = ContentKind::Facilities;

    fn fallback() -> Vec<Self> {
        [
            ("Library", "A quiet reading space with books for every grade level."),
            ("Science Laboratory", "Equipped for hands-on experiments."),
            ("Computer Room", "Internet-ready workstations for digital literacy."),
        ]
        .into_iter()
        .zip(1..)
        .map(|((name, description), display_order)| Self {
            id: None,
            name: name.to_string(),
            description: text(description),
            image_url: None,
            display_order: Some(display_order),
            is_active: Some(true),
        })
        .collect()
    }
}

impl ContentRecord for FooterSection {
    const KIND: ContentKind = ContentKind::Footer;

    fn fallback() -> Vec<Self> {
        vec![
            Self {
                id: None,
                title: "Contact Us".to_string(),
                content: text("Main Street, Our Town | info@school.example"),
                links: Vec::new(),
                display_order: Some(1),
                is_active: Some(true),
            },
            Self {
                id: None,
                title: "Quick Links".to_string(),
                content: None,
                links: vec![
                    FooterLink {
                        label: "About".to_string(),
                        url: "#about".to_string(),
                    },
                    FooterLink {
                        label: "Announcements".to_string(),
                        url: "#announcements".to_string(),
                    },
                    FooterLink {
                        label: "Gallery".to_string(),
                        url: "#gallery".to_string(),
                    },
                ],
                display_order: Some(2),
                is_active: Some(true),
            },
        ]
    }
}
