//! Cross-entity indices: categories, tags, and the date archive tree.
//!
//! Indices hold [`EntityRef`]s into the site's ascending post and photo
//! lists rather than copies, so they stay valid for as long as those lists
//! are not reordered.

use crate::entity::{Entity, EntityKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Position of an entity in its kind's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub index: usize,
}

/// The site's entity lists, borrowed together.
#[derive(Debug, Clone, Copy)]
pub struct Collections<'a> {
    pub posts: &'a [Entity],
    pub photos: &'a [Entity],
}

impl<'a> Collections<'a> {
    pub fn of(&self, kind: EntityKind) -> &'a [Entity] {
        match kind {
            EntityKind::Post => self.posts,
            EntityKind::Photo => self.photos,
        }
    }

    pub fn get(&self, r: EntityRef) -> Option<&'a Entity> {
        self.of(r.kind).get(r.index)
    }

    /// Every entity, posts first, each list in its stored order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, &'a Entity)> + 'a {
        let posts = self.posts;
        let photos = self.photos;
        EntityKind::ALL.into_iter().flat_map(move |kind| {
            let list = match kind {
                EntityKind::Post => posts,
                EntityKind::Photo => photos,
            };
            list.iter()
                .enumerate()
                .map(move |(index, e)| (EntityRef { kind, index }, e))
        })
    }
}

/// The attribute a [`TaxonomyIndex`] groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Categories,
    Tags,
}

impl Taxonomy {
    fn values(self, entity: &Entity) -> &[String] {
        match self {
            Taxonomy::Categories => &entity.categories,
            Taxonomy::Tags => &entity.tags,
        }
    }
}

/// Multi-map from a category or tag to the entities carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyIndex {
    taxonomy: Taxonomy,
    buckets: BTreeMap<String, Vec<EntityRef>>,
}

impl TaxonomyIndex {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            buckets: BTreeMap::new(),
        }
    }

    /// One entry per value per entity, in collection order.
    pub fn build(taxonomy: Taxonomy, collections: Collections<'_>) -> Self {
        let mut index = Self::new(taxonomy);
        for (r, entity) in collections.iter() {
            for value in taxonomy.values(entity) {
                index.buckets.entry(value.clone()).or_default().push(r);
            }
        }
        index
    }

    /// Sort every bucket newest first.
    pub fn sort_descending(&mut self, collections: Collections<'_>) {
        for bucket in self.buckets.values_mut() {
            bucket.sort_by(|a, b| match (collections.get(*a), collections.get(*b)) {
                (Some(a), Some(b)) => b.compare(a),
                _ => std::cmp::Ordering::Equal,
            });
        }
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    pub fn get(&self, key: &str) -> Option<&[EntityRef]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// `{ key: [entity views...] }` for the template payload.
    pub fn to_payload(
        &self,
        collections: Collections<'_>,
        view: impl Fn(&Entity) -> Value,
    ) -> Map<String, Value> {
        self.buckets
            .iter()
            .map(|(key, refs)| {
                let items = refs
                    .iter()
                    .filter_map(|r| collections.get(*r))
                    .map(&view)
                    .collect();
                (key.clone(), Value::Array(items))
            })
            .collect()
    }
}

type Days = BTreeMap<u32, Vec<usize>>;
type Months = BTreeMap<u32, Days>;

/// Year → month → day → indices into the ascending post list.
///
/// Built by walking posts newest first, so each day bucket lists its posts
/// newest first as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveTree {
    years: BTreeMap<i32, Months>,
}

impl ArchiveTree {
    pub fn build(posts: &[Entity]) -> Self {
        use chrono::Datelike;

        let mut years: BTreeMap<i32, Months> = BTreeMap::new();
        for (index, post) in posts.iter().enumerate().rev() {
            let date = post.date.date();
            years
                .entry(date.year())
                .or_default()
                .entry(date.month())
                .or_default()
                .entry(date.day())
                .or_default()
                .push(index);
        }
        Self { years }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn get(&self, year: i32, month: u32, day: u32) -> Option<&[usize]> {
        self.years
            .get(&year)?
            .get(&month)?
            .get(&day)
            .map(Vec::as_slice)
    }

    /// Years, newest first.
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().rev().copied()
    }

    /// Months of `year`, newest first.
    pub fn months(&self, year: i32) -> impl Iterator<Item = u32> + '_ {
        self.years
            .get(&year)
            .into_iter()
            .flat_map(|months| months.keys().rev().copied())
    }

    /// Days of `year`/`month`, newest first.
    pub fn days(&self, year: i32, month: u32) -> impl Iterator<Item = u32> + '_ {
        self.years
            .get(&year)
            .and_then(|months| months.get(&month))
            .into_iter()
            .flat_map(|days| days.keys().rev().copied())
    }

    /// All posts under a year, month or day, newest first.
    pub fn posts_in(&self, year: i32, month: Option<u32>, day: Option<u32>) -> Vec<usize> {
        let Some(months) = self.years.get(&year) else {
            return Vec::new();
        };
        months
            .iter()
            .rev()
            .filter(|(m, _)| month.is_none_or(|want| **m == want))
            .flat_map(|(_, days)| days.iter().rev())
            .filter(|(d, _)| day.is_none_or(|want| **d == want))
            .flat_map(|(_, posts)| posts.iter().copied())
            .collect()
    }

    /// `{ "2008": { "11": { "5": [post views...] } } }` for the template
    /// payload.
    pub fn to_payload(&self, posts: &[Entity], view: impl Fn(&Entity) -> Value) -> Value {
        let mut years = Map::new();
        for (year, months) in &self.years {
            let mut month_map = Map::new();
            for (month, days) in months {
                let mut day_map = Map::new();
                for (day, indices) in days {
                    let items = indices.iter().filter_map(|i| posts.get(*i)).map(&view).collect();
                    day_map.insert(day.to_string(), Value::Array(items));
                }
                month_map.insert(month.to_string(), Value::Object(day_map));
            }
            years.insert(year.to_string(), Value::Object(month_map));
        }
        Value::Object(years)
    }
}
