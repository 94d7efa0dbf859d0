//! Conflict detection and the regex-driven shadow router.
//!
//! Most native engines refuse to register a parameter route and a wildcard
//! route under the same static prefix (`/a/:b/c` next to `/a/*`). When the
//! route table is finalized, [`partition`] finds those prefixes and pulls
//! every route at or below them out of native registration. The engine
//! instead mounts a catch-all per prefix that forwards to a [`ShadowRouter`],
//! which tries each route's anchored regex in specificity order.
//!
//! Matches are remembered per `(method, path)` in a [`ShadowCache`]. The
//! cache is bounded by resetting it wholesale once it reaches its maximum; a
//! lookup racing a reset just falls back to the regex scan.

use {
    super::{onion::Chain, pattern::ParamBinding, table::RouteEntry},
    crate::Result,
    arc_swap::ArcSwap,
    dashmap::DashMap,
    http::Method,
    regex::Regex,
    std::{
        collections::{BTreeMap, BTreeSet},
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    },
};

/// A route served by the shadow router.
pub(crate) struct ShadowRoute {
    pub(crate) method: Method,
    pub(crate) regex: Regex,
    pub(crate) bindings: Vec<ParamBinding>,
    pub(crate) chain: Arc<Chain>,
}

impl ShadowRoute {
    fn compile(entry: RouteEntry) -> Result<Self> {
        let (regex, bindings) = entry.pattern.shadow_regex()?;
        Ok(Self {
            method: entry.method,
            regex,
            bindings,
            chain: entry.chain,
        })
    }

    /// Captures keyed by native group name, matching the engine contract.
    fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.bindings
                .iter()
                .enumerate()
                .filter_map(|(i, binding)| {
                    caps.name(&format!("p{i}"))
                        .map(|m| (binding.native.clone(), m.as_str().to_owned()))
                })
                .collect(),
        )
    }
}

/// Routes under one conflicting prefix, most specific first.
pub(crate) struct ShadowZone {
    pub(crate) prefix: String,
    pub(crate) routes: Vec<ShadowRoute>,
}

/// Outcome of a shadow lookup.
pub(crate) enum Resolution<'a> {
    Matched {
        route: &'a ShadowRoute,
        params: Vec<(String, String)>,
    },
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// All shadow zones of one router plus their shared match cache.
pub(crate) struct ShadowRouter {
    zones: Vec<ShadowZone>,
    cache: ShadowCache,
}

impl ShadowRouter {
    pub(crate) fn new(zones: Vec<ShadowZone>, max_cache_size: usize) -> Self {
        Self {
            zones,
            cache: ShadowCache::new(max_cache_size),
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &ShadowCache {
        &self.cache
    }

    /// Finds the route of `zone` serving `method` and `path`.
    pub(crate) fn resolve(&self, zone: usize, method: &Method, path: &str) -> Resolution<'_> {
        let Some(routes) = self.zones.get(zone).map(|z| &z.routes) else {
            return Resolution::NotFound;
        };

        let key = CacheKey {
            method: method.clone(),
            path: path.to_owned(),
        };
        let cached = self.cache.get(&key).and_then(|index| {
            let route = routes.get(index)?;
            route.captures(path).map(|params| (route, params))
        });
        if let Some((route, params)) = cached {
            return Resolution::Matched { route, params };
        }

        let mut allowed = Vec::new();
        let mut head_fallback = None;
        for (index, route) in routes.iter().enumerate() {
            let Some(params) = route.captures(path) else {
                continue;
            };
            if route.method == *method {
                self.cache.insert(key, index);
                return Resolution::Matched { route, params };
            }
            if *method == Method::HEAD && route.method == Method::GET && head_fallback.is_none() {
                head_fallback = Some((index, params));
                continue;
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        // HEAD falls back to GET, as on native routes.
        if let Some((index, params)) = head_fallback {
            self.cache.insert(key, index);
            return Resolution::Matched {
                route: &routes[index],
                params,
            };
        }

        if allowed.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::MethodNotAllowed(allowed)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    method: Method,
    path: String,
}

/// Bounded `(method, path) -> route index` map with coarse eviction.
pub(crate) struct ShadowCache {
    map: ArcSwap<DashMap<CacheKey, usize>>,
    len: AtomicUsize,
    max: usize,
}

impl ShadowCache {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            map: ArcSwap::from_pointee(DashMap::new()),
            len: AtomicUsize::new(0),
            max,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<usize> {
        self.map.load().get(key).map(|entry| *entry.value())
    }

    fn insert(&self, key: CacheKey, index: usize) {
        if self.max == 0 {
            return;
        }
        let map = self.map.load_full();
        if map.contains_key(&key) {
            return;
        }
        if self.len.fetch_add(1, Ordering::AcqRel) >= self.max {
            let fresh = DashMap::new();
            fresh.insert(key, index);
            self.map.store(Arc::new(fresh));
            self.len.store(1, Ordering::Release);
            tracing::debug!(max = self.max, "Shadow route cache reset");
            return;
        }
        map.insert(key, index);
    }

    /// Number of entries counted since the last reset.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}

/// Splits finalized routes into those the engine registers natively and the
/// shadow zones of every conflicting prefix.
pub(crate) fn partition(entries: Vec<RouteEntry>) -> Result<(Vec<RouteEntry>, Vec<ShadowZone>)> {
    let mut flags: BTreeMap<String, (bool, bool)> = BTreeMap::new();
    for entry in &entries {
        if let Some(prefix) = entry.pattern.dynamic_prefix() {
            let flag = flags.entry(prefix).or_default();
            flag.0 |= entry.pattern.has_params();
            flag.1 |= entry.pattern.has_wildcard();
        }
    }

    let conflicting: BTreeSet<String> = flags
        .into_iter()
        .filter(|(_, (params, wildcard))| *params && *wildcard)
        .map(|(prefix, _)| prefix)
        .collect();

    // Nested conflicting prefixes fold into the outermost one.
    let outermost: Vec<String> = conflicting
        .iter()
        .filter(|prefix| {
            !conflicting.iter().any(|other| {
                other != *prefix && super::pattern::Pattern::parse(prefix).is_under(other)
            })
        })
        .cloned()
        .collect();

    let mut native = Vec::new();
    let mut zoned: Vec<Vec<RouteEntry>> = outermost.iter().map(|_| Vec::new()).collect();
    for entry in entries {
        match outermost.iter().position(|p| entry.pattern.is_under(p)) {
            Some(zone) => zoned[zone].push(entry),
            None => native.push(entry),
        }
    }

    // The zone mount outranks native siblings that could match paths under
    // it, so those siblings are served from the zone as well.
    for entry in &native {
        for (zone, prefix) in outermost.iter().enumerate() {
            if entry.pattern.overlaps(prefix) {
                zoned[zone].push(entry.clone());
            }
        }
    }

    let mut zones = Vec::with_capacity(outermost.len());
    for (prefix, mut routes) in outermost.into_iter().zip(zoned) {
        routes.sort_by_cached_key(|entry| (entry.pattern.specificity(), entry.pattern.rank()));
        tracing::debug!(
            prefix = %prefix,
            routes = routes.len(),
            "Serving conflicting prefix through the shadow router"
        );
        let routes = routes
            .into_iter()
            .map(ShadowRoute::compile)
            .collect::<Result<Vec<_>>>()?;
        zones.push(ShadowZone { prefix, routes });
    }

    Ok((native, zones))
}
