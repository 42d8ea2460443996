//! Thread-safe store for campaigns, bid responses, and bid optimizations.
//!
//! Stands in for the persistence layer: everything lives in memory behind a
//! single `RwLock`, cloned out on read.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::data::models::{
    BidOptimization, BidRequest, BidResponse, Campaign, CampaignMetric, CampaignStatus,
    CampaignType, Creative, CreativeType, OptimizationStatus, PerformanceSummary,
};
use crate::errors::AdOptError;

/// Ids below this are reserved for the sample campaigns.
const FIRST_ASSIGNED_CAMPAIGN_ID: u64 = 3;

#[derive(Debug)]
struct Inner {
    campaigns: BTreeMap<u64, Campaign>,
    bid_responses: HashMap<String, BidResponse>,
    optimizations: BTreeMap<u64, BidOptimization>,
    next_campaign_id: u64,
    next_optimization_id: u64,
}

#[derive(Debug, Clone)]
pub struct CampaignStore {
    inner: Arc<RwLock<Inner>>,
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                campaigns: BTreeMap::new(),
                bid_responses: HashMap::new(),
                optimizations: BTreeMap::new(),
                next_campaign_id: FIRST_ASSIGNED_CAMPAIGN_ID,
                next_optimization_id: 1,
            })),
        }
    }

    /// Store seeded with the two sample campaigns.
    pub fn with_sample_campaigns() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().unwrap();
            for campaign in sample_campaigns(Utc::now()) {
                inner.campaigns.insert(campaign.id, campaign);
            }
        }
        info!(campaigns = 2, "Sample campaigns loaded");
        store
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    pub fn find_all(&self) -> Vec<Campaign> {
        self.inner.read().unwrap().campaigns.values().cloned().collect()
    }

    pub fn find(&self, campaign_id: u64) -> Option<Campaign> {
        self.inner.read().unwrap().campaigns.get(&campaign_id).cloned()
    }

    /// Insert or replace. A campaign with id 0 gets the next free id.
    pub fn save(&self, mut campaign: Campaign) -> Campaign {
        let mut inner = self.inner.write().unwrap();
        if campaign.id == 0 {
            campaign.id = inner.next_campaign_id;
            inner.next_campaign_id += 1;
        }
        inner.campaigns.insert(campaign.id, campaign.clone());
        campaign
    }

    pub fn delete(&self, campaign_id: u64) -> Option<Campaign> {
        self.inner.write().unwrap().campaigns.remove(&campaign_id)
    }

    pub fn update_status(
        &self,
        campaign_id: u64,
        status: CampaignStatus,
    ) -> Result<Campaign, AdOptError> {
        let mut inner = self.inner.write().unwrap();
        let campaign = inner
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(AdOptError::CampaignNotFound(campaign_id))?;
        campaign.status = status;
        Ok(campaign.clone())
    }

    /// Active, funded, in-schedule campaigns with a creative for the slot.
    pub fn find_eligible(&self, request: &BidRequest, now: DateTime<Utc>) -> Vec<Campaign> {
        self.inner
            .read()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| {
                c.is_running_at(now)
                    && c.has_budget()
                    && c.has_creative_for(request.ad_slot_width, request.ad_slot_height)
            })
            .cloned()
            .collect()
    }

    /// Active campaigns inside their schedule window.
    pub fn find_running(&self, now: DateTime<Utc>) -> Vec<Campaign> {
        self.inner
            .read()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| c.is_running_at(now))
            .cloned()
            .collect()
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Metric days within the inclusive, optionally open-ended range.
    pub fn metrics_between(
        &self,
        campaign_id: u64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<CampaignMetric> {
        let inner = self.inner.read().unwrap();
        let Some(campaign) = inner.campaigns.get(&campaign_id) else {
            return Vec::new();
        };
        campaign
            .metrics
            .iter()
            .filter(|m| start.map_or(true, |s| m.date >= s))
            .filter(|m| end.map_or(true, |e| m.date <= e))
            .cloned()
            .collect()
    }

    pub fn performance_summary(&self, campaign_id: u64) -> Option<PerformanceSummary> {
        self.inner
            .read()
            .unwrap()
            .campaigns
            .get(&campaign_id)
            .map(PerformanceSummary::from_campaign)
    }

    /// Fold an auction outcome into the campaign's metric for `date`,
    /// charging the clearing price against spend and remaining budget.
    pub fn record_auction_result(
        &self,
        response: &BidResponse,
        won: bool,
        clicked: bool,
        converted: bool,
        date: NaiveDate,
    ) -> Result<(), AdOptError> {
        let mut inner = self.inner.write().unwrap();
        let campaign = inner
            .campaigns
            .get_mut(&response.campaign_id)
            .ok_or(AdOptError::CampaignNotFound(response.campaign_id))?;

        let index = match campaign.metrics.iter().position(|m| m.date == date) {
            Some(i) => i,
            None => {
                campaign.metrics.push(CampaignMetric::empty(date));
                campaign.metrics.len() - 1
            }
        };

        let mut charged = Decimal::ZERO;
        {
            let metric = &mut campaign.metrics[index];
            if won {
                metric.impressions += 1;
                if let Some(price) = response.actual_price {
                    metric.spend += price;
                    charged = price;
                }
            }
            if clicked {
                metric.clicks += 1;
            }
            if converted {
                metric.conversions += 1;
            }
        }
        campaign.remaining_budget -= charged;

        debug!(
            campaign_id = campaign.id,
            won,
            clicked,
            converted,
            charged = %charged,
            remaining_budget = %campaign.remaining_budget,
            "Auction result recorded"
        );
        Ok(())
    }

    // =========================================================================
    // Bid responses
    // =========================================================================

    pub fn save_bid_response(&self, response: BidResponse) {
        let mut inner = self.inner.write().unwrap();
        inner
            .bid_responses
            .insert(response.response_id.clone(), response);
    }

    pub fn find_bid_response(&self, response_id: &str) -> Option<BidResponse> {
        self.inner
            .read()
            .unwrap()
            .bid_responses
            .get(response_id)
            .cloned()
    }

    pub fn bid_response_count(&self) -> usize {
        self.inner.read().unwrap().bid_responses.len()
    }

    // =========================================================================
    // Optimizations
    // =========================================================================

    /// Store a new optimization, assigning its id.
    pub fn add_optimization(&self, mut optimization: BidOptimization) -> BidOptimization {
        let mut inner = self.inner.write().unwrap();
        optimization.id = inner.next_optimization_id;
        inner.next_optimization_id += 1;
        inner
            .optimizations
            .insert(optimization.id, optimization.clone());
        optimization
    }

    pub fn find_optimization(&self, id: u64) -> Option<BidOptimization> {
        self.inner.read().unwrap().optimizations.get(&id).cloned()
    }

    pub fn optimizations_for(&self, campaign_id: u64) -> Vec<BidOptimization> {
        self.inner
            .read()
            .unwrap()
            .optimizations
            .values()
            .filter(|o| o.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub fn optimizations_with_status(&self, status: OptimizationStatus) -> Vec<BidOptimization> {
        self.inner
            .read()
            .unwrap()
            .optimizations
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }

    pub fn pending_optimizations(&self) -> Vec<BidOptimization> {
        self.optimizations_with_status(OptimizationStatus::Pending)
    }

    /// Set the campaign's max bid to the optimized bid and mark it applied.
    pub fn apply_optimization(
        &self,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<BidOptimization, AdOptError> {
        let mut inner = self.inner.write().unwrap();
        let Inner {
            campaigns,
            optimizations,
            ..
        } = &mut *inner;

        let optimization = pending_mut(optimizations, id)?;
        let campaign = campaigns
            .get_mut(&optimization.campaign_id)
            .ok_or(AdOptError::CampaignNotFound(optimization.campaign_id))?;

        campaign.max_bid_price = optimization.optimized_bid;
        optimization.status = OptimizationStatus::Applied;
        optimization.applied_at = Some(now);

        info!(
            optimization_id = id,
            campaign_id = campaign.id,
            max_bid = %campaign.max_bid_price,
            "Optimization applied"
        );
        Ok(optimization.clone())
    }

    pub fn reject_optimization(&self, id: u64) -> Result<BidOptimization, AdOptError> {
        let mut inner = self.inner.write().unwrap();
        let optimization = pending_mut(&mut inner.optimizations, id)?;
        optimization.status = OptimizationStatus::Rejected;
        Ok(optimization.clone())
    }
}

fn pending_mut(
    optimizations: &mut BTreeMap<u64, BidOptimization>,
    id: u64,
) -> Result<&mut BidOptimization, AdOptError> {
    let optimization = optimizations
        .get_mut(&id)
        .ok_or(AdOptError::OptimizationNotFound(id))?;
    if optimization.status != OptimizationStatus::Pending {
        return Err(AdOptError::OptimizationNotPending {
            id,
            status: optimization.status,
        });
    }
    Ok(optimization)
}

// =============================================================================
// Sample data
// =============================================================================

fn sample_creative(id: u64, width: u32, height: u32) -> Creative {
    Creative {
        id,
        name: format!("Sample Creative {id}"),
        image_url: format!("https://example.com/images/ad_{width}x{height}.jpg"),
        landing_page_url: format!("https://example.com/landing?creative={id}"),
        width,
        height,
        creative_type: CreativeType::Image,
        active: true,
    }
}

/// A CPC tech campaign (id 1) and a CPA fashion campaign (id 2).
pub fn sample_campaigns(now: DateTime<Utc>) -> Vec<Campaign> {
    let audiences = |names: &[&str]| -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    };

    vec![
        Campaign {
            id: 1,
            name: "Tech Gadget Promotion".to_string(),
            description: "Promoting the latest tech gadgets".to_string(),
            advertiser_id: "tech_company_123".to_string(),
            campaign_type: CampaignType::Cpc,
            total_budget: Decimal::new(1000, 0),
            remaining_budget: Decimal::new(1000, 0),
            daily_budget: Decimal::new(100, 0),
            bid_floor: Some(Decimal::new(10, 2)),
            max_bid_price: Decimal::new(200, 2),
            target_ctr: Some(0.02),
            target_conversion_rate: Some(0.15),
            start_date: Some(now - Duration::days(1)),
            end_date: Some(now + Duration::days(30)),
            status: CampaignStatus::Active,
            creatives: vec![sample_creative(1, 300, 250), sample_creative(2, 728, 90)],
            target_audiences: audiences(&["tech_enthusiasts", "gadget_buyers"]),
            metrics: Vec::new(),
        },
        Campaign {
            id: 2,
            name: "Fashion Sale".to_string(),
            description: "Promoting seasonal fashion sale".to_string(),
            advertiser_id: "fashion_ecommerce_456".to_string(),
            campaign_type: CampaignType::Cpa,
            total_budget: Decimal::new(2000, 0),
            remaining_budget: Decimal::new(2000, 0),
            daily_budget: Decimal::new(200, 0),
            bid_floor: Some(Decimal::new(50, 2)),
            max_bid_price: Decimal::new(500, 2),
            target_ctr: Some(0.015),
            target_conversion_rate: Some(0.05),
            start_date: Some(now - Duration::days(2)),
            end_date: Some(now + Duration::days(15)),
            status: CampaignStatus::Active,
            creatives: vec![sample_creative(3, 300, 250), sample_creative(4, 300, 600)],
            target_audiences: audiences(&["fashion_enthusiasts", "online_shoppers"]),
            metrics: Vec::new(),
        },
    ]
}
