//! 카운터 서비스 -- 순환형 단조 증가 정수 생성기
//!
//! 두 가지 변형을 제공합니다.
//!
//! - [`CounterSet`]: 워커가 소유하는 카운터 묶음. 동기화 없이 `&mut`로만 접근하며
//!   레코드 ID의 순번을 만듭니다.
//! - [`SharedCounterRegistry`]: 워커 ID로 키가 잡힌 공유 카운터 맵.
//!   진단(워커별 처리 건수)용이며 여러 워커와 헬스 체크가 동시에 읽고 씁니다.
//!
//! 두 변형 모두 `refresh_ceiling`에 도달하면 0으로 되돌아갑니다. 에러는 없습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// 워커 로컬 카운터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCounter {
    value: u64,
    refresh_ceiling: Option<u64>,
}

impl LocalCounter {
    /// 0에서 시작하는 카운터를 생성합니다.
    pub fn new(refresh_ceiling: Option<u64>) -> Self {
        Self {
            value: 0,
            refresh_ceiling,
        }
    }

    /// `n`만큼 증가시키고 새 값을 반환합니다.
    ///
    /// 새 값이 ceiling 이상이면 0으로 되돌아갑니다.
    pub fn add(&mut self, n: u64) -> u64 {
        self.value = wrap(self.value.saturating_add(n), self.refresh_ceiling);
        self.value
    }

    /// `n`만큼 감소시키고 새 값을 반환합니다 (0 미만으로 내려가지 않음).
    pub fn sub(&mut self, n: u64) -> u64 {
        self.value = self.value.saturating_sub(n);
        self.value
    }

    /// 현재 값을 반환합니다.
    pub fn value(&self) -> u64 {
        self.value
    }
}

fn wrap(value: u64, ceiling: Option<u64>) -> u64 {
    match ceiling {
        Some(ceiling) if value >= ceiling => 0,
        _ => value,
    }
}

/// 워커가 소유하는 스코프별 카운터 묶음
///
/// 같은 스코프로 [`get`](Self::get)을 반복 호출하면 항상 같은 카운터를 돌려줍니다.
#[derive(Debug, Default)]
pub struct CounterSet {
    refresh_ceiling: Option<u64>,
    counters: HashMap<String, LocalCounter>,
}

impl CounterSet {
    /// 모든 카운터에 같은 ceiling을 적용하는 묶음을 생성합니다.
    pub fn new(refresh_ceiling: Option<u64>) -> Self {
        Self {
            refresh_ceiling,
            counters: HashMap::new(),
        }
    }

    /// 스코프의 카운터를 반환합니다. 처음이면 0으로 생성합니다.
    pub fn get(&mut self, scope: &str) -> &mut LocalCounter {
        let ceiling = self.refresh_ceiling;
        self.counters
            .entry(scope.to_owned())
            .or_insert_with(|| LocalCounter::new(ceiling))
    }

    /// 생성된 스코프 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// 생성된 스코프가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// 워커 간에 공유되는 원자적 카운터
#[derive(Debug)]
pub struct SharedCounter {
    value: AtomicU64,
    refresh_ceiling: Option<u64>,
}

impl SharedCounter {
    fn new(refresh_ceiling: Option<u64>) -> Self {
        Self {
            value: AtomicU64::new(0),
            refresh_ceiling,
        }
    }

    /// `n`만큼 증가시키고 새 값을 반환합니다 (ceiling 도달 시 0).
    pub fn add(&self, n: u64) -> u64 {
        let ceiling = self.refresh_ceiling;
        let previous = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(wrap(current.saturating_add(n), ceiling))
            })
            .unwrap_or_else(|current| current);
        wrap(previous.saturating_add(n), ceiling)
    }

    /// `n`만큼 감소시키고 새 값을 반환합니다 (0 미만으로 내려가지 않음).
    pub fn sub(&self, n: u64) -> u64 {
        let previous = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(n))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_sub(n)
    }

    /// 현재 값을 반환합니다.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

/// 워커 ID와 스코프로 키가 잡힌 공유 카운터 레지스트리
#[derive(Debug, Default)]
pub struct SharedCounterRegistry {
    refresh_ceiling: Option<u64>,
    counters: RwLock<HashMap<(usize, String), Arc<SharedCounter>>>,
}

impl SharedCounterRegistry {
    /// 새 레지스트리를 생성합니다.
    pub fn new(refresh_ceiling: Option<u64>) -> Self {
        Self {
            refresh_ceiling,
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// (워커, 스코프)의 카운터를 반환합니다. 같은 키에 대해 항상 같은 인스턴스입니다.
    pub fn get(&self, worker: usize, scope: &str) -> Arc<SharedCounter> {
        let key = (worker, scope.to_owned());
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.get(&key) {
                return Arc::clone(counter);
            }
        }

        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        let ceiling = self.refresh_ceiling;
        Arc::clone(
            counters
                .entry(key)
                .or_insert_with(|| Arc::new(SharedCounter::new(ceiling))),
        )
    }

    /// 모든 카운터 값을 (워커, 스코프) 순으로 정렬해 반환합니다.
    pub fn snapshot(&self) -> Vec<(usize, String, u64)> {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        let mut values: Vec<_> = counters
            .iter()
            .map(|((worker, scope), counter)| (*worker, scope.clone(), counter.value()))
            .collect();
        values.sort();
        values
    }

    /// 모든 워커에 걸친 스코프 합계를 반환합니다.
    pub fn total(&self, scope: &str) -> u64 {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters
            .iter()
            .filter(|((_, s), _)| s == scope)
            .map(|(_, counter)| counter.value())
            .sum()
    }
}
